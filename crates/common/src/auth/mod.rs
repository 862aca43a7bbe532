//! Authentication and authorization utilities
//!
//! Provides:
//! - JWT session tokens and the `SessionUser` extractor
//! - Role checks and tenant context resolution
//! - Verification token generation and hashing
//! - The client for the external auth provider's sign-up endpoint

use crate::db::models::{Store, Tenant, TenantMembership, UserRole};
use crate::db::TenantRepository;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Authenticated caller, decoded from the session token
#[derive(Debug, Clone)]
pub struct SessionUser {
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: UserRole,
}

impl SessionUser {
    /// Require a platform role, returning 403 otherwise
    pub fn require_role(&self, role: UserRole) -> Result<()> {
        if self.role == role {
            Ok(())
        } else {
            Err(AppError::Forbidden {
                message: format!("Requires role {}", role.as_str()),
            })
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,

    pub email: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Platform role (`super_admin`, `seller`, `customer`)
    pub role: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Issue a session token for `user`
    pub fn issue_token(&self, user: &SessionUser) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = SessionClaims {
            sub: user.user_id.to_string(),
            email: user.email.clone(),
            name: user.name.clone(),
            role: user.role.as_str().to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate a token and build the session user from its claims
    pub fn validate_token(&self, token: &str) -> Result<SessionUser> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::InvalidToken)?;

        Ok(SessionUser {
            user_id,
            email: claims.email,
            name: claims.name,
            role: UserRole::from(claims.role),
        })
    }
}

/// Extract the token from an `Authorization: Bearer` header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// SHA-256 hex digest; verification tokens are stored only in this form
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// 32 random bytes, hex encoded
pub fn generate_verification_token() -> String {
    let random_bytes: [u8; 32] = rand::random();
    hex::encode(random_bytes)
}

/// Axum extractor for the session user
impl<S> FromRequestParts<S> for SessionUser
where
    Arc<JwtManager>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Expected a Bearer session token".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let user = jwt.validate_token(token)?;

        debug!(user_id = %user.user_id, role = user.role.as_str(), "Session authenticated");
        Ok(user)
    }
}

// ============================================================================
// Tenant context
// ============================================================================

/// The caller's tenant, store and membership
#[derive(Debug, Clone)]
pub struct TenantContext {
    pub tenant: Tenant,
    pub store: Store,
    pub membership: TenantMembership,
}

/// Resolve the tenant the caller belongs to; 404 when not onboarded yet
pub async fn tenant_context<R>(repo: &R, user: &SessionUser) -> Result<TenantContext>
where
    R: TenantRepository + ?Sized,
{
    let membership = repo
        .find_membership_by_user(user.user_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: format!("membership of {}", user.user_id),
        })?;

    let tenant = repo
        .find_tenant(membership.tenant_id)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: membership.tenant_id.to_string(),
        })?;

    let store = repo
        .find_store_by_tenant(tenant.id)
        .await?
        .ok_or_else(|| AppError::StoreNotFound {
            id: tenant.id.to_string(),
        })?;

    Ok(TenantContext {
        tenant,
        store,
        membership,
    })
}

// ============================================================================
// Auth provider
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderUser {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignUpResponse {
    pub user: ProviderUser,
}

/// External identity provider that owns credentials
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Create an email/password account. A rejected or already registered
    /// email is `Unprocessable`.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse>;
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Auth provider reached over HTTP (`POST /api/auth/sign-up/email`)
pub struct HttpAuthProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAuthProvider {
    pub fn new(base_url: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AuthProvider for HttpAuthProvider {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse> {
        let url = format!("{}/api/auth/sign-up/email", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response.json::<SignUpResponse>().await?);
        }

        let detail = response
            .json::<ProviderError>()
            .await
            .ok()
            .and_then(|e| e.message.or(e.error))
            .unwrap_or_else(|| format!("provider returned {}", status));

        if status.is_client_error() {
            warn!(status = status.as_u16(), detail = %detail, "Auth provider rejected sign-up");
            return Err(AppError::Unprocessable { message: detail });
        }

        Err(AppError::Upstream {
            message: format!("Auth provider sign-up failed: {}", detail),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seller() -> SessionUser {
        SessionUser {
            user_id: Uuid::new_v4(),
            email: "jane@example.com".to_string(),
            name: Some("Jane".to_string()),
            role: UserRole::Seller,
        }
    }

    #[test]
    fn test_hash_token_is_stable_hex() {
        let hash = hash_token("abc");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("abc"));
        assert_ne!(hash, hash_token("abd"));
    }

    #[test]
    fn test_verification_token_shape() {
        let token = generate_verification_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_verification_token());
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc"), Some("abc"));
        assert_eq!(extract_bearer("Bearer "), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);
        let user = seller();

        let token = manager.issue_token(&user).unwrap();
        let decoded = manager.validate_token(&token).unwrap();

        assert_eq!(decoded.user_id, user.user_id);
        assert_eq!(decoded.email, user.email);
        assert_eq!(decoded.role, UserRole::Seller);
    }

    #[test]
    fn test_foreign_token_is_rejected() {
        let token = JwtManager::new("one", 3600).issue_token(&seller()).unwrap();
        let err = JwtManager::new("two", 3600).validate_token(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn test_require_role() {
        let user = seller();
        assert!(user.require_role(UserRole::Seller).is_ok());
        assert!(matches!(
            user.require_role(UserRole::SuperAdmin),
            Err(AppError::Forbidden { .. })
        ));
    }
}
