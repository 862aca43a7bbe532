//! Recording fakes for the outbound seams
//!
//! Enabled for unit tests and, through the `testing` feature, for the
//! integration tests of this crate and the gateway.

use crate::auth::{AuthProvider, ProviderUser, SignUpRequest, SignUpResponse};
use crate::db::models::Store;
use crate::errors::{AppError, Result};
use crate::integrations::{Platform, SocialProfile, SocialProfileClient};
use crate::notify::{EmailMessage, Mailer};
use crate::site_builder::SiteGenerator;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Mailer that keeps every message it accepts
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every following send
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, message: EmailMessage) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Email {
                message: "mail provider unavailable".to_string(),
            });
        }
        self.sent.lock().await.push(message);
        Ok(())
    }
}

/// Auth provider that remembers registered emails
#[derive(Clone, Default)]
pub struct FakeAuthProvider {
    registered: Arc<Mutex<HashSet<String>>>,
    unreachable: Arc<AtomicBool>,
}

impl FakeAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub async fn registered(&self) -> Vec<String> {
        self.registered.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl AuthProvider for FakeAuthProvider {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<SignUpResponse> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AppError::Upstream {
                message: "auth provider connection refused".to_string(),
            });
        }

        let email = request.email.to_lowercase();
        let mut registered = self.registered.lock().await;
        if !registered.insert(email.clone()) {
            return Err(AppError::Unprocessable {
                message: "User already exists".to_string(),
            });
        }

        Ok(SignUpResponse {
            user: ProviderUser {
                id: format!("usr_{}", registered.len()),
                email,
            },
        })
    }
}

/// Social client with canned profiles per platform
#[derive(Clone, Default)]
pub struct FakeSocialClient {
    profiles: Arc<Mutex<Vec<(Platform, SocialProfile)>>>,
    tokens: Arc<Mutex<Vec<String>>>,
}

impl FakeSocialClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn with_profile(self, platform: Platform, profile: SocialProfile) -> Self {
        self.profiles.lock().await.push((platform, profile));
        self
    }

    /// Access tokens seen so far
    pub async fn tokens(&self) -> Vec<String> {
        self.tokens.lock().await.clone()
    }
}

#[async_trait]
impl SocialProfileClient for FakeSocialClient {
    async fn fetch_profile(&self, platform: Platform, access_token: &str) -> Result<SocialProfile> {
        self.tokens.lock().await.push(access_token.to_string());
        self.profiles
            .lock()
            .await
            .iter()
            .find(|(p, _)| *p == platform)
            .map(|(_, profile)| profile.clone())
            .ok_or_else(|| AppError::Upstream {
                message: format!("{} API: status 500 Internal Server Error", platform),
            })
    }
}

/// Generator returning a fixed reply, or a fixed error
#[derive(Clone)]
pub struct FakeSiteGenerator {
    reply: std::result::Result<String, String>,
}

impl FakeSiteGenerator {
    pub fn replying(reply: impl Into<String>) -> Self {
        Self { reply: Ok(reply.into()) }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            reply: Err(message.into()),
        }
    }
}

#[async_trait]
impl SiteGenerator for FakeSiteGenerator {
    async fn generate(&self, _prompt: &str, _store: &Store) -> Result<String> {
        // Yield so callers observe the job before it finishes
        tokio::task::yield_now().await;
        self.reply.clone().map_err(|message| AppError::Upstream { message })
    }
}
