//! Layered configuration
//!
//! Sources, later ones winning: built-in defaults, `config/default`,
//! `config/{APP_ENV}`, `config/local`, then `APP__`-prefixed environment
//! variables (`APP__SERVER__PORT=8081`).

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder secret of `AppConfig::default()`; accepted only in development
pub const INSECURE_JWT_SECRET: &str = "change-me";

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Cache configuration (optional backend)
    #[serde(default)]
    pub cache: CacheSettings,

    /// Session and auth-provider configuration
    pub auth: AuthConfig,

    /// Email provider configuration
    #[serde(default)]
    pub email: EmailConfig,

    /// Public URLs used in links and emails
    #[serde(default)]
    pub app: PublicUrls,

    /// Social platform API endpoints
    #[serde(default)]
    pub integrations: IntegrationsConfig,

    /// Site builder (LLM) configuration
    #[serde(default)]
    pub site_builder: SiteBuilderConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary database URL (for writes); `memory://` selects the in-process store
    pub url: String,

    /// Read replica URL (optional, falls back to primary)
    pub read_url: Option<String>,

    /// Maximum number of connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of connections
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Idle timeout in seconds
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Run SQL migrations on startup
    #[serde(default = "default_enabled")]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheSettings {
    /// Redis URL; caching is bypassed when unset
    pub url: Option<String>,

    /// Use the in-process cache instead of Redis when no URL is set
    #[serde(default)]
    pub in_memory: bool,

    /// Default TTL in seconds
    #[serde(default = "default_cache_ttl")]
    pub default_ttl_secs: u64,

    /// Key prefix for namespacing
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Secret used to sign and verify session tokens; required
    pub jwt_secret: String,

    /// Session lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,

    /// Base URL of the auth provider (sign-up endpoint)
    #[serde(default = "default_auth_url")]
    pub provider_url: String,

    /// Verification token lifetime in hours
    #[serde(default = "default_verification_ttl")]
    pub verification_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailConfig {
    /// Email API base URL; emails are only logged when unset
    pub api_base: Option<String>,

    /// Email API key
    pub api_key: Option<String>,

    /// Sender address
    #[serde(default = "default_email_from")]
    pub from: String,

    /// Request timeout in seconds
    #[serde(default = "default_outbound_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublicUrls {
    /// Public web app URL (storefronts, magic links)
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntegrationsConfig {
    /// Instagram Graph API base
    #[serde(default = "default_instagram_api")]
    pub instagram_api_base: String,

    /// TikTok open API base
    #[serde(default = "default_tiktok_api")]
    pub tiktok_api_base: String,

    /// Request timeout in seconds
    #[serde(default = "default_outbound_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteBuilderConfig {
    /// OpenAI-compatible API base
    #[serde(default = "default_llm_api")]
    pub api_base: String,

    /// API key; the site builder is disabled when unset
    pub api_key: Option<String>,

    /// Chat model
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    /// Maximum elapsed time for retries in seconds
    #[serde(default = "default_llm_retry_window")]
    pub max_retry_secs: u64,

    /// How long finished jobs stay readable, in seconds
    #[serde(default = "default_job_retention")]
    pub job_retention_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Expose /metrics
    #[serde(default = "default_enabled")]
    pub metrics_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second (global)
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_connections() -> u32 { 20 }
fn default_min_connections() -> u32 { 2 }
fn default_connect_timeout() -> u64 { 10 }
fn default_idle_timeout() -> u64 { 300 }
fn default_cache_ttl() -> u64 { 300 }
fn default_key_prefix() -> String { "vendly".to_string() }
fn default_jwt_expiration() -> u64 { 60 * 60 * 24 * 7 }
fn default_auth_url() -> String { "http://localhost:3000".to_string() }
fn default_verification_ttl() -> i64 { 24 }
fn default_email_from() -> String { "Vendly <noreply@vendly.app>".to_string() }
fn default_outbound_timeout() -> u64 { 15 }
fn default_app_url() -> String { "http://localhost:3000".to_string() }
fn default_instagram_api() -> String { "https://graph.instagram.com".to_string() }
fn default_tiktok_api() -> String { "https://open.tiktokapis.com".to_string() }
fn default_llm_api() -> String { "https://api.openai.com/v1".to_string() }
fn default_llm_model() -> String { "gpt-4o-mini".to_string() }
fn default_llm_timeout() -> u64 { 60 }
fn default_llm_retry_window() -> u64 { 30 }
fn default_job_retention() -> u64 { 60 * 60 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_rate_limit() -> u32 { 50 }
fn default_burst() -> u32 { 100 }
fn default_enabled() -> bool { true }

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            url: None,
            in_memory: false,
            default_ttl_secs: default_cache_ttl(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            from: default_email_from(),
            timeout_secs: default_outbound_timeout(),
        }
    }
}

impl Default for PublicUrls {
    fn default() -> Self {
        Self {
            app_url: default_app_url(),
        }
    }
}

impl Default for IntegrationsConfig {
    fn default() -> Self {
        Self {
            instagram_api_base: default_instagram_api(),
            tiktok_api_base: default_tiktok_api(),
            timeout_secs: default_outbound_timeout(),
        }
    }
}

impl Default for SiteBuilderConfig {
    fn default() -> Self {
        Self {
            api_base: default_llm_api(),
            api_key: None,
            model: default_llm_model(),
            timeout_secs: default_llm_timeout(),
            max_retry_secs: default_llm_retry_window(),
            job_retention_secs: default_job_retention(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_enabled: default_enabled(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.check_secrets(&env)?;
        Ok(config)
    }

    /// Reject a blank session secret, and the placeholder outside development
    pub fn check_secrets(&self, env: &str) -> Result<(), ConfigError> {
        let secret = self.auth.jwt_secret.trim();
        if secret.is_empty() {
            return Err(ConfigError::Message("auth.jwt_secret must be set".to_string()));
        }
        if secret == INSECURE_JWT_SECRET && env != "development" {
            return Err(ConfigError::Message(format!(
                "auth.jwt_secret is the placeholder value; set a real secret for APP_ENV={}",
                env
            )));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Whether the in-process repository is selected
    pub fn uses_memory_database(&self) -> bool {
        self.database.url.starts_with("memory://")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: default_host(),
                port: default_port(),
                request_timeout_secs: default_request_timeout(),
            },
            database: DatabaseConfig {
                url: "postgres://localhost/vendly".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
                run_migrations: default_enabled(),
            },
            cache: CacheSettings::default(),
            auth: AuthConfig {
                jwt_secret: INSECURE_JWT_SECRET.to_string(),
                jwt_expiration_secs: default_jwt_expiration(),
                provider_url: default_auth_url(),
                verification_ttl_hours: default_verification_ttl(),
            },
            email: EmailConfig::default(),
            app: PublicUrls::default(),
            integrations: IntegrationsConfig::default(),
            site_builder: SiteBuilderConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}
