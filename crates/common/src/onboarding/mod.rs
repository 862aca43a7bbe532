//! Seller onboarding and tenant provisioning
//!
//! Three entry points:
//! - `complete_onboarding`: self-service, idempotent per user
//! - `provision_for_admin`: a super admin sets up a seller's tenant and store
//! - `admin_signup`: account creation through the auth provider

mod payload;

pub use payload::{
    AdminSignupRequest, AdminTenantRequest, BusinessInfo, OnboardingEnvelope, OnboardingPayload,
    PersonalInfo, StoreInfo, ValidOnboarding,
};

use crate::auth::{generate_verification_token, hash_token, AuthProvider, SessionUser, SignUpRequest};
use crate::config::PublicUrls;
use crate::db::models::{Store, Tenant, TenantStatus, UserRole};
use crate::db::{NewStore, NewTenant, ProvisionOutcome, ProvisionRequest, Provisioned, Repository};
use crate::errors::{AppError, Result};
use crate::metrics::record_onboarding;
use crate::notify::{deliver, templates, Delivery, DynMailer};
use crate::slug::tenant_base_from_email;
use chrono::{Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

const DEFAULT_CURRENCY: &str = "USD";

/// Response of `POST /api/onboarding`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingResult {
    pub success: bool,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub store_slug: String,
    pub tenant_slug: String,
    pub email_sent: bool,
    pub email_error: Option<String>,
    pub already_onboarded: bool,
}

impl OnboardingResult {
    fn new(provisioned: &Provisioned, delivery: Delivery, already_onboarded: bool) -> Self {
        Self {
            success: true,
            tenant_id: provisioned.tenant.id,
            store_id: provisioned.store.id,
            store_slug: provisioned.store.slug.clone(),
            tenant_slug: provisioned.tenant.slug.clone(),
            email_sent: delivery.sent,
            email_error: delivery.error,
            already_onboarded,
        }
    }
}

/// Response of `POST /api/tenants`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProvisionResult {
    pub success: bool,
    pub tenant: Tenant,
    pub store: Store,
    pub email_sent: bool,
    pub email_error: Option<String>,
}

/// Response of `POST /api/admin-signup`
#[derive(Debug, Clone, Serialize)]
pub struct AdminSignupResult {
    pub success: bool,
    pub message: String,
}

#[derive(Clone)]
pub struct OnboardingService {
    repo: Arc<dyn Repository>,
    mailer: DynMailer,
    auth_provider: Arc<dyn AuthProvider>,
    urls: PublicUrls,
    verification_ttl_hours: i64,
}

impl OnboardingService {
    pub fn new(
        repo: Arc<dyn Repository>,
        mailer: DynMailer,
        auth_provider: Arc<dyn AuthProvider>,
        urls: PublicUrls,
        verification_ttl_hours: i64,
    ) -> Self {
        Self {
            repo,
            mailer,
            auth_provider,
            urls,
            verification_ttl_hours,
        }
    }

    // ========================================================================
    // Self-service onboarding
    // ========================================================================

    /// Validate the payload and provision the caller's tenant and store.
    ///
    /// A caller who already has a membership gets the existing ids back;
    /// a tenant created by an admin is activated with the new snapshot.
    pub async fn complete_onboarding(
        &self,
        user_id: Uuid,
        email: &str,
        payload: OnboardingPayload,
    ) -> Result<OnboardingResult> {
        let valid = payload.validate_sections()?;
        let snapshot = snapshot_of(&valid)?;

        if let Some(existing) = self.find_existing(user_id).await? {
            return self.resume(existing, &valid, snapshot).await;
        }

        let request = ProvisionRequest {
            user_id,
            tenant: NewTenant {
                name: valid.personal.full_name.clone(),
                slug_source: tenant_base_from_email(email),
                billing_email: email.to_string(),
                phone: Some(valid.personal.phone_number.clone()),
                status: TenantStatus::Active,
                snapshot: snapshot.clone(),
            },
            store: NewStore {
                name: valid.store.store_name.clone(),
                description: Some(valid.store.store_description.clone()),
                currency: valid
                    .store
                    .currency
                    .clone()
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                contact_email: Some(email.to_string()),
                contact_phone: Some(valid.personal.phone_number.clone()),
                location: valid.store.location.clone(),
                categories: valid.store.categories.clone(),
            },
            return_existing: true,
        };

        let outcome = match self.repo.provision(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                record_onboarding("self_service", "error");
                return Err(e);
            }
        };

        match outcome {
            ProvisionOutcome::Existing(existing) => self.resume(existing, &valid, snapshot).await,
            ProvisionOutcome::Created(created) => {
                record_onboarding("self_service", "created");
                info!(
                    user_id = %user_id,
                    tenant_id = %created.tenant.id,
                    store_slug = %created.store.slug,
                    "Onboarding completed"
                );

                let delivery = self.send_welcome(&created, &valid, email).await;
                Ok(OnboardingResult::new(&created, delivery, false))
            }
        }
    }

    async fn find_existing(&self, user_id: Uuid) -> Result<Option<Provisioned>> {
        let Some(membership) = self.repo.find_membership_by_user(user_id).await? else {
            return Ok(None);
        };

        let tenant = self
            .repo
            .find_tenant(membership.tenant_id)
            .await?
            .ok_or_else(|| AppError::TenantNotFound {
                id: membership.tenant_id.to_string(),
            })?;
        let store = self
            .repo
            .find_store_by_tenant(tenant.id)
            .await?
            .ok_or_else(|| AppError::StoreNotFound {
                id: tenant.id.to_string(),
            })?;

        Ok(Some(Provisioned {
            tenant,
            membership,
            store,
        }))
    }

    /// Existing membership: activate an admin-created tenant, never touch an active one
    async fn resume(
        &self,
        mut existing: Provisioned,
        valid: &ValidOnboarding,
        snapshot: serde_json::Value,
    ) -> Result<OnboardingResult> {
        record_onboarding("self_service", "existing");

        if existing.tenant.tenant_status() != TenantStatus::Onboarding {
            info!(tenant_id = %existing.tenant.id, "User already onboarded, returning existing tenant");
            return Ok(OnboardingResult::new(&existing, Delivery::default(), true));
        }

        existing.tenant = self.repo.activate_tenant(existing.tenant.id, snapshot).await?;
        info!(tenant_id = %existing.tenant.id, "Admin-provisioned tenant activated");

        let to = existing.tenant.billing_email.clone();
        let delivery = self.send_welcome(&existing, valid, &to).await;
        Ok(OnboardingResult::new(&existing, delivery, true))
    }

    async fn send_welcome(&self, provisioned: &Provisioned, valid: &ValidOnboarding, to: &str) -> Delivery {
        let store_url = format!(
            "{}/{}",
            self.urls.app_url.trim_end_matches('/'),
            provisioned.store.slug
        );
        let message = templates::welcome(
            to,
            &valid.personal.full_name,
            &provisioned.store.name,
            &store_url,
        );
        deliver(self.mailer.as_ref(), message).await
    }

    // ========================================================================
    // Admin provisioning
    // ========================================================================

    /// Create a seller's tenant (status `onboarding`), owner membership and
    /// store, then email a magic link. Only super admins may call this.
    pub async fn provision_for_admin(
        &self,
        admin: &SessionUser,
        request: AdminTenantRequest,
    ) -> Result<AdminProvisionResult> {
        admin.require_role(UserRole::SuperAdmin)?;
        let request = request.normalized()?;

        let user = match self.repo.find_user_by_email(&request.email).await? {
            Some(user) => user,
            None => match self
                .repo
                .create_user(&request.email, &request.full_name, UserRole::Seller)
                .await
            {
                Ok(user) => user,
                // Lost a race with a concurrent request for the same email
                Err(AppError::Duplicate { .. }) => self
                    .repo
                    .find_user_by_email(&request.email)
                    .await?
                    .ok_or_else(|| AppError::Internal {
                        message: "user vanished after duplicate insert".to_string(),
                    })?,
                Err(e) => return Err(e),
            },
        };

        if self.repo.find_membership_by_user(user.id).await?.is_some() {
            return Err(AppError::Duplicate {
                message: format!("{} already has a tenant", request.email),
            });
        }

        let snapshot = serde_json::json!({
            "source": "admin",
            "createdBy": admin.user_id,
            "request": &request,
        });

        let provision = ProvisionRequest {
            user_id: user.id,
            tenant: NewTenant {
                name: request.full_name.clone(),
                slug_source: request.full_name.clone(),
                billing_email: request.email.clone(),
                phone: request.phone_number.clone(),
                status: TenantStatus::Onboarding,
                snapshot,
            },
            store: NewStore {
                name: request.store_name.clone(),
                description: request.store_description.clone(),
                currency: DEFAULT_CURRENCY.to_string(),
                contact_email: Some(request.email.clone()),
                contact_phone: request.phone_number.clone(),
                location: request.store_location.clone(),
                categories: request.categories.clone(),
            },
            return_existing: false,
        };

        let provisioned = match self.repo.provision(provision).await {
            Ok(outcome) => outcome.into_provisioned(),
            Err(e) => {
                record_onboarding("admin", "error");
                return Err(e);
            }
        };
        record_onboarding("admin", "created");

        info!(
            admin_id = %admin.user_id,
            tenant_id = %provisioned.tenant.id,
            tenant_slug = %provisioned.tenant.slug,
            store_slug = %provisioned.store.slug,
            "Tenant provisioned by admin"
        );

        let delivery = self.send_magic_link(&request, &provisioned.store).await;

        Ok(AdminProvisionResult {
            success: true,
            tenant: provisioned.tenant,
            store: provisioned.store,
            email_sent: delivery.sent,
            email_error: delivery.error,
        })
    }

    async fn send_magic_link(&self, request: &AdminTenantRequest, store: &Store) -> Delivery {
        let link = match self.issue_verification(&request.email).await {
            Ok(link) => link,
            Err(e) => {
                warn!(email = %request.email, error = %e, "Could not issue verification token");
                return Delivery {
                    sent: false,
                    error: Some(e.to_string()),
                };
            }
        };

        let message = templates::magic_link(
            &request.email,
            &request.full_name,
            &store.name,
            &link,
            self.verification_ttl_hours,
        );
        deliver(self.mailer.as_ref(), message).await
    }

    /// Store a hashed token for `email` and return the verify URL carrying the raw one
    async fn issue_verification(&self, email: &str) -> Result<String> {
        let token = generate_verification_token();
        let expires_at = Utc::now() + Duration::hours(self.verification_ttl_hours);

        self.repo
            .create_verification_token(email, &hash_token(&token), expires_at)
            .await?;

        verify_url(&self.urls.app_url, &token, email)
    }

    // ========================================================================
    // Admin sign-up
    // ========================================================================

    /// Register through the auth provider, then send a verification email.
    /// Provider rejections are 422; anything unexpected is a generic 500.
    pub async fn admin_signup(&self, request: AdminSignupRequest) -> Result<AdminSignupResult> {
        let request = AdminSignupRequest {
            email: request.email.trim().to_lowercase(),
            name: request.name.trim().to_string(),
            password: request.password,
        };
        request.validate()?;

        let sign_up = SignUpRequest {
            email: request.email.clone(),
            password: request.password.clone(),
            name: request.name.clone(),
        };

        match self.auth_provider.sign_up(&sign_up).await {
            Ok(response) => {
                info!(provider_user_id = %response.user.id, "Admin account created");
            }
            Err(e @ (AppError::Unprocessable { .. } | AppError::Validation { .. })) => {
                return Err(e)
            }
            Err(e) => {
                return Err(AppError::Internal {
                    message: format!("sign-up failed: {}", e),
                })
            }
        }

        let delivery = match self.issue_verification(&request.email).await {
            Ok(link) => {
                let message = templates::verification(&request.email, &request.name, &link);
                deliver(self.mailer.as_ref(), message).await
            }
            Err(e) => {
                warn!(error = %e, "Could not issue verification token");
                Delivery {
                    sent: false,
                    error: Some(e.to_string()),
                }
            }
        };

        let message = if delivery.sent {
            "Account created. Check your email to verify your address.".to_string()
        } else {
            "Account created, but the verification email could not be sent.".to_string()
        };

        Ok(AdminSignupResult {
            success: true,
            message,
        })
    }
}

fn snapshot_of(valid: &ValidOnboarding) -> Result<serde_json::Value> {
    let mut snapshot = serde_json::to_value(valid)?;
    if let Some(obj) = snapshot.as_object_mut() {
        obj.insert(
            "completedAt".to_string(),
            serde_json::Value::String(Utc::now().to_rfc3339()),
        );
    }
    Ok(snapshot)
}

/// `{app_url}/auth/verify?token=...&email=...`
fn verify_url(app_url: &str, token: &str, email: &str) -> Result<String> {
    let base = format!("{}/auth/verify", app_url.trim_end_matches('/'));
    reqwest::Url::parse_with_params(&base, &[("token", token), ("email", email)])
        .map(|url| url.to_string())
        .map_err(|e| AppError::Configuration {
            message: format!("invalid app url '{}': {}", app_url, e),
        })
}
