//! Instagram and TikTok profile sync
//!
//! The auth provider stores the OAuth access token when a seller links an
//! account. Sync reads that token, fetches the public profile and keeps one
//! `social_accounts` row per tenant and platform.

use crate::auth::TenantContext;
use crate::cache::{keys, CacheLayer};
use crate::config::IntegrationsConfig;
use crate::db::models::{SocialAccount, StoreBranding};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::metrics::record_social_sync;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Instagram,
    Tiktok,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "instagram" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            other => Err(AppError::Validation {
                message: format!("unsupported platform '{}'", other),
                field: Some("platform".to_string()),
            }),
        }
    }
}

/// Platform-neutral profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialProfile {
    pub external_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub follower_count: Option<i64>,
    pub media_count: Option<i64>,
}

#[async_trait]
pub trait SocialProfileClient: Send + Sync {
    /// Failures of the platform API are `Upstream`
    async fn fetch_profile(&self, platform: Platform, access_token: &str) -> Result<SocialProfile>;
}

// ============================================================================
// HTTP client
// ============================================================================

#[derive(Debug, Deserialize)]
struct InstagramMe {
    id: String,
    username: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    profile_picture_url: Option<String>,
    #[serde(default)]
    followers_count: Option<i64>,
    #[serde(default)]
    media_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TiktokEnvelope {
    #[serde(default)]
    data: Option<TiktokData>,
    #[serde(default)]
    error: Option<TiktokError>,
}

#[derive(Debug, Deserialize)]
struct TiktokData {
    user: TiktokUser,
}

#[derive(Debug, Deserialize)]
struct TiktokUser {
    open_id: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    follower_count: Option<i64>,
    #[serde(default)]
    video_count: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TiktokError {
    code: String,
    #[serde(default)]
    message: String,
}

const INSTAGRAM_FIELDS: &str = "id,username,name,profile_picture_url,followers_count,media_count";
const TIKTOK_FIELDS: &str = "open_id,username,display_name,avatar_url,follower_count,video_count";

fn upstream(platform: Platform, detail: impl fmt::Display) -> AppError {
    AppError::Upstream {
        message: format!("{} API: {}", platform, detail),
    }
}

/// Instagram Graph and TikTok Open API client
pub struct HttpSocialClient {
    client: reqwest::Client,
    instagram_base: String,
    tiktok_base: String,
}

impl HttpSocialClient {
    pub fn new(config: &IntegrationsConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            instagram_base: config.instagram_api_base.trim_end_matches('/').to_string(),
            tiktok_base: config.tiktok_api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn instagram(&self, token: &str) -> Result<SocialProfile> {
        let platform = Platform::Instagram;
        let response = self
            .client
            .get(format!("{}/me", self.instagram_base))
            .query(&[("fields", INSTAGRAM_FIELDS), ("access_token", token)])
            .send()
            .await
            .map_err(|e| upstream(platform, e))?;

        if !response.status().is_success() {
            return Err(upstream(platform, format!("status {}", response.status())));
        }

        let me: InstagramMe = response.json().await.map_err(|e| upstream(platform, e))?;
        Ok(SocialProfile {
            external_id: me.id,
            display_name: me.name,
            username: me.username,
            avatar_url: me.profile_picture_url,
            follower_count: me.followers_count,
            media_count: me.media_count,
        })
    }

    async fn tiktok(&self, token: &str) -> Result<SocialProfile> {
        let platform = Platform::Tiktok;
        let response = self
            .client
            .get(format!("{}/v2/user/info/", self.tiktok_base))
            .query(&[("fields", TIKTOK_FIELDS)])
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| upstream(platform, e))?;

        if !response.status().is_success() {
            return Err(upstream(platform, format!("status {}", response.status())));
        }

        let envelope: TiktokEnvelope = response.json().await.map_err(|e| upstream(platform, e))?;
        if let Some(err) = envelope.error.filter(|e| e.code != "ok") {
            return Err(upstream(platform, format!("{} {}", err.code, err.message)));
        }

        let user = envelope
            .data
            .map(|d| d.user)
            .ok_or_else(|| upstream(platform, "response carried no user"))?;

        Ok(SocialProfile {
            username: user
                .username
                .clone()
                .or_else(|| user.display_name.clone())
                .unwrap_or_else(|| user.open_id.clone()),
            external_id: user.open_id,
            display_name: user.display_name,
            avatar_url: user.avatar_url,
            follower_count: user.follower_count,
            media_count: user.video_count,
        })
    }
}

#[async_trait]
impl SocialProfileClient for HttpSocialClient {
    async fn fetch_profile(&self, platform: Platform, access_token: &str) -> Result<SocialProfile> {
        match platform {
            Platform::Instagram => self.instagram(access_token).await,
            Platform::Tiktok => self.tiktok(access_token).await,
        }
    }
}

// ============================================================================
// Service
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub account: SocialAccount,
    pub logo_updated: bool,
}

#[derive(Clone)]
pub struct IntegrationService {
    repo: Arc<dyn Repository>,
    cache: CacheLayer,
    client: Arc<dyn SocialProfileClient>,
}

impl IntegrationService {
    pub fn new(repo: Arc<dyn Repository>, cache: CacheLayer, client: Arc<dyn SocialProfileClient>) -> Self {
        Self { repo, cache, client }
    }

    pub async fn sync(
        &self,
        user_id: Uuid,
        ctx: &TenantContext,
        platform: Platform,
        update_logo: bool,
    ) -> Result<SyncResult> {
        let token = self
            .repo
            .find_access_token(user_id, platform.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource_type: "LinkedAccount".to_string(),
                id: platform.to_string(),
            })?;

        let profile = match self.client.fetch_profile(platform, &token).await {
            Ok(profile) => profile,
            Err(e) => {
                record_social_sync(platform.as_str(), false);
                warn!(platform = %platform, tenant_id = %ctx.tenant.id, error = %e, "Profile fetch failed");
                return Err(e);
            }
        };

        let account = self
            .repo
            .upsert_social_account(SocialAccount {
                id: Uuid::new_v4(),
                tenant_id: ctx.tenant.id,
                platform: platform.as_str().to_string(),
                external_id: profile.external_id,
                username: profile.username,
                display_name: profile.display_name,
                avatar_url: profile.avatar_url.clone(),
                follower_count: profile.follower_count,
                media_count: profile.media_count,
                synced_at: Utc::now().into(),
            })
            .await?;

        let logo_updated = match profile.avatar_url.filter(|_| update_logo) {
            Some(avatar) => {
                let branding = StoreBranding {
                    logo_url: Some(avatar),
                    ..Default::default()
                };
                self.repo.update_store_branding(ctx.store.id, &branding).await?;
                self.cache.invalidate_pattern(&keys::store_pattern(&ctx.store.slug)).await;
                true
            }
            None => false,
        };

        record_social_sync(platform.as_str(), true);
        info!(
            platform = %platform,
            tenant_id = %ctx.tenant.id,
            username = %account.username,
            logo_updated,
            "Social profile synced"
        );

        Ok(SyncResult {
            success: true,
            account,
            logo_updated,
        })
    }
}
