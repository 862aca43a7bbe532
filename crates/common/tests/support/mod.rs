//! Shared fixtures for the service integration tests

#![allow(dead_code)]

use std::sync::Arc;
use uuid::Uuid;
use vendly_common::auth::{tenant_context, SessionUser, TenantContext};
use vendly_common::cache::{CacheLayer, MemoryCache};
use vendly_common::config::PublicUrls;
use vendly_common::db::models::UserRole;
use vendly_common::db::MemoryRepository;
use vendly_common::onboarding::{OnboardingPayload, OnboardingService};
use vendly_common::testing::{FakeAuthProvider, RecordingMailer};

pub const APP_URL: &str = "https://app.vendly.test";

pub struct Harness {
    pub repo: Arc<MemoryRepository>,
    pub mailer: RecordingMailer,
    pub auth: FakeAuthProvider,
    pub onboarding: OnboardingService,
}

impl Harness {
    pub fn new() -> Self {
        let repo = Arc::new(MemoryRepository::new());
        let mailer = RecordingMailer::new();
        let auth = FakeAuthProvider::new();
        let onboarding = OnboardingService::new(
            repo.clone(),
            Arc::new(mailer.clone()),
            Arc::new(auth.clone()),
            PublicUrls {
                app_url: APP_URL.to_string(),
            },
            24,
        );

        Self {
            repo,
            mailer,
            auth,
            onboarding,
        }
    }

    /// Onboard a fresh seller and return their session and tenant context
    pub async fn seller_with_store(&self, email: &str, store_name: &str) -> (SessionUser, TenantContext) {
        let user = seller(email);
        self.onboarding
            .complete_onboarding(user.user_id, &user.email, payload(store_name))
            .await
            .expect("onboarding succeeds");
        let ctx = tenant_context(self.repo.as_ref(), &user)
            .await
            .expect("tenant context");
        (user, ctx)
    }
}

pub fn memory_cache() -> CacheLayer {
    CacheLayer::new(Arc::new(MemoryCache::new(1_000)))
}

pub fn seller(email: &str) -> SessionUser {
    SessionUser {
        user_id: Uuid::new_v4(),
        email: email.to_string(),
        name: Some("Jane Doe".to_string()),
        role: UserRole::Seller,
    }
}

pub fn super_admin() -> SessionUser {
    SessionUser {
        user_id: Uuid::new_v4(),
        email: "ops@vendly.test".to_string(),
        name: Some("Ops".to_string()),
        role: UserRole::SuperAdmin,
    }
}

pub fn payload(store_name: &str) -> OnboardingPayload {
    serde_json::from_value(serde_json::json!({
        "personal": { "fullName": "Jane Doe", "phoneNumber": "+256700000001", "country": "UG" },
        "store": {
            "storeName": store_name,
            "storeDescription": "Handmade goods",
            "categories": ["Fashion", "Home"],
            "location": "Kampala"
        },
        "business": { "businessType": "individual", "salesChannels": ["instagram"] }
    }))
    .expect("valid payload json")
}
