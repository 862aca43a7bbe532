//! AI site builder
//!
//! A job asks an LLM for storefront branding and applies it to the store.
//! Jobs live in an in-process registry; they are not persisted and vanish on
//! restart. Pending and running jobs stay until they finish; finished jobs are
//! kept for a retention window and then dropped.

use crate::auth::TenantContext;
use crate::cache::{keys, CacheLayer};
use crate::config::SiteBuilderConfig;
use crate::db::models::{Store, StoreBranding};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use crate::metrics::record_site_job;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use moka::sync::Cache;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

pub const MAX_PROMPT_CHARS: usize = 2000;

/// How long a finished job stays readable unless configured otherwise
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(60 * 60);

const MAX_FINISHED_JOBS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Branding proposed by the model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteDesign {
    pub theme: String,
    pub primary_color: String,
    pub secondary_color: String,
    #[serde(default)]
    pub headline: Option<String>,
    #[serde(default)]
    pub tagline: Option<String>,
}

impl SiteDesign {
    fn branding(&self) -> StoreBranding {
        StoreBranding {
            theme: Some(self.theme.clone()),
            logo_url: None,
            primary_color: Some(self.primary_color.clone()),
            secondary_color: Some(self.secondary_color.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub store_id: Uuid,
    pub prompt: String,
    pub status: JobStatus,
    pub design: Option<SiteDesign>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Turns a prompt into the model's raw reply
#[async_trait]
pub trait SiteGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, store: &Store) -> Result<String>;
}

fn is_hex_color(value: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("static color regex"))
        .is_match(value)
}

/// Parse the model reply as a design.
///
/// Models often wrap the object in prose or code fences, so a failed parse
/// retries on the slice between the first `{` and the last `}`.
pub fn parse_design(raw: &str) -> Result<SiteDesign> {
    let design: SiteDesign = match serde_json::from_str(raw.trim()) {
        Ok(design) => design,
        Err(_) => {
            let start = raw.find('{');
            let end = raw.rfind('}');
            match (start, end) {
                (Some(start), Some(end)) if start < end => serde_json::from_str(&raw[start..=end])
                    .map_err(|e| AppError::Upstream {
                        message: format!("model returned an unusable design: {}", e),
                    })?,
                _ => {
                    return Err(AppError::Upstream {
                        message: "model reply contained no JSON object".to_string(),
                    })
                }
            }
        }
    };

    for color in [&design.primary_color, &design.secondary_color] {
        if !is_hex_color(color) {
            return Err(AppError::Upstream {
                message: format!("model returned invalid color '{}'", color),
            });
        }
    }
    if design.theme.trim().is_empty() {
        return Err(AppError::Upstream {
            message: "model returned an empty theme".to_string(),
        });
    }

    Ok(design)
}

// ============================================================================
// OpenAI-compatible generator
// ============================================================================

const SYSTEM_PROMPT: &str = "You design storefront branding for small online shops. \
Reply with a single JSON object with the keys theme, primaryColor, secondaryColor, \
headline and tagline. Colors are #RRGGBB hex strings. theme is one of minimal, bold, \
classic, playful.";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiSiteGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    model: String,
    max_retry: Duration,
}

impl OpenAiSiteGenerator {
    pub fn new(config: &SiteBuilderConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            model: config.model.clone(),
            max_retry: Duration::from_secs(config.max_retry_secs),
        })
    }

    fn user_prompt(prompt: &str, store: &Store) -> String {
        let categories = store.category_list().join(", ");
        format!(
            "Store name: {}\nDescription: {}\nCategories: {}\nRequest: {}",
            store.name,
            store.description.as_deref().unwrap_or("-"),
            if categories.is_empty() { "-" } else { &categories },
            prompt
        )
    }

    async fn complete(&self, api_key: &str, user_prompt: &str) -> std::result::Result<String, backoff::Error<AppError>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: 0.7,
            response_format: ResponseFormat { kind: "json_object" },
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                backoff::Error::transient(AppError::Upstream {
                    message: format!("site generator request failed: {}", e),
                })
            })?;

        let status = response.status();
        if !status.is_success() {
            let err = AppError::Upstream {
                message: format!("site generator returned status {}", status),
            };
            return Err(if status.is_server_error() || status.as_u16() == 429 {
                backoff::Error::transient(err)
            } else {
                backoff::Error::permanent(err)
            });
        }

        let body: ChatResponse = response.json().await.map_err(|e| {
            backoff::Error::permanent(AppError::Upstream {
                message: format!("site generator response: {}", e),
            })
        })?;

        body.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                backoff::Error::permanent(AppError::Upstream {
                    message: "site generator returned no choices".to_string(),
                })
            })
    }
}

#[async_trait]
impl SiteGenerator for OpenAiSiteGenerator {
    async fn generate(&self, prompt: &str, store: &Store) -> Result<String> {
        let api_key = self.api_key.as_deref().ok_or_else(|| AppError::Configuration {
            message: "site_builder.api_key is not set".to_string(),
        })?;
        let user_prompt = Self::user_prompt(prompt, store);

        let policy = ExponentialBackoff {
            max_elapsed_time: Some(self.max_retry),
            ..Default::default()
        };

        retry(policy, || async {
            self.complete(api_key, &user_prompt).await.map_err(|e| {
                if let backoff::Error::Transient { err, .. } = &e {
                    warn!(error = %err, "Site generator call failed, retrying");
                }
                e
            })
        })
        .await
    }
}

// ============================================================================
// Job registry
// ============================================================================

#[derive(Clone)]
pub struct SiteBuilder {
    active: Arc<DashMap<Uuid, SiteJob>>,
    finished: Cache<Uuid, SiteJob>,
    repo: Arc<dyn Repository>,
    cache: CacheLayer,
    generator: Arc<dyn SiteGenerator>,
}

fn finished_registry(retention: Duration) -> Cache<Uuid, SiteJob> {
    Cache::builder()
        .max_capacity(MAX_FINISHED_JOBS)
        .time_to_live(retention)
        .build()
}

impl SiteBuilder {
    pub fn new(repo: Arc<dyn Repository>, cache: CacheLayer, generator: Arc<dyn SiteGenerator>) -> Self {
        Self {
            active: Arc::new(DashMap::new()),
            finished: finished_registry(DEFAULT_JOB_RETENTION),
            repo,
            cache,
            generator,
        }
    }

    /// Keep finished jobs readable for `retention` after they finish
    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.finished = finished_registry(retention);
        self
    }

    /// Register a pending job and run it in the background.
    pub fn start(&self, ctx: &TenantContext, prompt: String) -> Result<SiteJob> {
        let prompt = prompt.trim().to_string();
        let chars = prompt.chars().count();
        if chars == 0 || chars > MAX_PROMPT_CHARS {
            return Err(AppError::Validation {
                message: format!("prompt must be 1 to {} characters", MAX_PROMPT_CHARS),
                field: Some("prompt".to_string()),
            });
        }

        let now = Utc::now();
        let job = SiteJob {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant.id,
            store_id: ctx.store.id,
            prompt,
            status: JobStatus::Pending,
            design: None,
            error: None,
            created_at: now,
            updated_at: now,
        };
        self.active.insert(job.id, job.clone());

        let builder = self.clone();
        let store = ctx.store.clone();
        let (job_id, prompt) = (job.id, job.prompt.clone());
        tokio::spawn(async move {
            builder.run(job_id, store, prompt).await;
        });

        info!(job_id = %job.id, tenant_id = %job.tenant_id, "Site builder job queued");
        Ok(job)
    }

    /// Job of the caller's tenant; other tenants' jobs and expired ones look missing
    pub fn get(&self, ctx: &TenantContext, job_id: Uuid) -> Result<SiteJob> {
        self.active
            .get(&job_id)
            .map(|job| job.clone())
            .or_else(|| self.finished.get(&job_id))
            .filter(|job| job.tenant_id == ctx.tenant.id)
            .ok_or_else(|| AppError::JobNotFound { id: job_id.to_string() })
    }

    /// Move a job to `status`; finished jobs leave the active map for the
    /// expiring registry
    fn transition(&self, job_id: Uuid, status: JobStatus, apply: impl FnOnce(&mut SiteJob)) {
        let Some(mut job) = self.active.get(&job_id).map(|job| job.clone()) else {
            return;
        };
        job.status = status;
        job.updated_at = Utc::now();
        apply(&mut job);

        if status.is_finished() {
            // readable from `finished` before it disappears from `active`
            self.finished.insert(job_id, job);
            self.active.remove(&job_id);
        } else {
            self.active.insert(job_id, job);
        }
    }

    async fn run(&self, job_id: Uuid, store: Store, prompt: String) {
        let started = Instant::now();
        self.transition(job_id, JobStatus::Running, |_| {});

        match self.generate_and_apply(&store, &prompt).await {
            Ok(design) => {
                self.transition(job_id, JobStatus::Completed, |job| job.design = Some(design));
                record_site_job(JobStatus::Completed.as_str(), started.elapsed().as_secs_f64());
                info!(job_id = %job_id, store_id = %store.id, "Site builder job completed");
            }
            Err(e) => {
                let message = e.to_string();
                self.transition(job_id, JobStatus::Failed, |job| job.error = Some(message));
                record_site_job(JobStatus::Failed.as_str(), started.elapsed().as_secs_f64());
                error!(job_id = %job_id, store_id = %store.id, error = %e, "Site builder job failed");
            }
        }
    }

    async fn generate_and_apply(&self, store: &Store, prompt: &str) -> Result<SiteDesign> {
        let raw = self.generator.generate(prompt, store).await?;
        let design = parse_design(&raw)?;

        self.repo.update_store_branding(store.id, &design.branding()).await?;
        self.cache.invalidate_pattern(&keys::store_pattern(&store.slug)).await;

        Ok(design)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_parse_plain_json() {
        let design = parse_design(
            r##"{"theme":"bold","primaryColor":"#112233","secondaryColor":"#AABBCC","headline":"Hi"}"##,
        )
        .unwrap();
        assert_eq!(design.theme, "bold");
        assert_eq!(design.headline.as_deref(), Some("Hi"));
        assert!(design.tagline.is_none());
    }

    #[test]
    fn test_parse_wrapped_in_prose() {
        let raw = "Sure! Here is your design:\n```json\n{\"theme\":\"minimal\",\"primaryColor\":\"#000000\",\"secondaryColor\":\"#ffffff\"}\n```\nEnjoy.";
        let design = parse_design(raw).unwrap();
        assert_eq!(design.theme, "minimal");
        assert_eq!(design.secondary_color, "#ffffff");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_design("no json here"), Err(AppError::Upstream { .. })));
        assert_err!(parse_design("} backwards {"));
    }

    #[test]
    fn test_parse_rejects_bad_color() {
        let raw = r##"{"theme":"bold","primaryColor":"red","secondaryColor":"#ffffff"}"##;
        assert_err!(parse_design(raw));
    }

    #[test]
    fn test_status_finished() {
        assert!(JobStatus::Completed.is_finished());
        assert!(JobStatus::Failed.is_finished());
        assert!(!JobStatus::Running.is_finished());
        assert_eq!(serde_json::to_string(&JobStatus::Pending).unwrap(), "\"pending\"");
    }
}
