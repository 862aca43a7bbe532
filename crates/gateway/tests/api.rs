//! End-to-end tests of the HTTP surface over the in-memory repository

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use regex_lite::Regex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use vendly_common::auth::{JwtManager, SessionUser};
use vendly_common::cache::{CacheLayer, MemoryCache};
use vendly_common::config::AppConfig;
use vendly_common::db::models::UserRole;
use vendly_common::integrations::{Platform, SocialProfile};
use vendly_common::testing::{FakeAuthProvider, FakeSiteGenerator, FakeSocialClient, RecordingMailer};
use vendly_common::MemoryRepository;
use vendly_gateway::{create_router, AppState, Dependencies};

const SECRET: &str = "test-secret";
const DESIGN: &str = r##"{"theme":"minimal","primaryColor":"#101010","secondaryColor":"#efefef"}"##;

struct TestApp {
    router: Router,
    repo: Arc<MemoryRepository>,
    mailer: RecordingMailer,
    jwt: JwtManager,
}

async fn app_with(config: AppConfig) -> TestApp {
    let repo = Arc::new(MemoryRepository::new());
    let mailer = RecordingMailer::new();
    let social = FakeSocialClient::new()
        .with_profile(
            Platform::Instagram,
            SocialProfile {
                external_id: "1789".to_string(),
                username: "janeshop".to_string(),
                display_name: None,
                avatar_url: Some("https://cdn.instagram.test/jane.jpg".to_string()),
                follower_count: Some(10),
                media_count: Some(3),
            },
        )
        .await;

    let deps = Dependencies {
        repo: repo.clone(),
        cache: CacheLayer::new(Arc::new(MemoryCache::new(1_000))),
        mailer: Arc::new(mailer.clone()),
        auth_provider: Arc::new(FakeAuthProvider::new()),
        social_client: Arc::new(social),
        site_generator: Arc::new(FakeSiteGenerator::replying(DESIGN)),
        metrics: None,
    };

    TestApp {
        router: create_router(AppState::new(config, deps)),
        repo,
        mailer,
        jwt: JwtManager::new(SECRET, 3600),
    }
}

async fn app() -> TestApp {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.rate_limit.enabled = false;
    app_with(config).await
}

impl TestApp {
    fn token(&self, user: &SessionUser) -> String {
        tokio_test::assert_ok!(self.jwt.issue_token(user))
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    /// Onboard `user` through the API and return the response body
    async fn onboard(&self, user: &SessionUser, store_name: &str) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/api/onboarding",
                Some(&self.token(user)),
                Some(onboarding_body(store_name)),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{}", body);
        body
    }
}

fn user(role: UserRole, email: &str) -> SessionUser {
    SessionUser {
        user_id: Uuid::new_v4(),
        email: email.to_string(),
        name: Some("Jane".to_string()),
        role,
    }
}

fn onboarding_body(store_name: &str) -> Value {
    json!({
        "data": {
            "personal": { "fullName": "Jane Doe", "phoneNumber": "+256700000001" },
            "store": {
                "storeName": store_name,
                "storeDescription": "Handmade goods",
                "categories": ["Fashion"]
            },
            "business": { "businessType": "individual" }
        }
    })
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_and_ready() {
    let app = app().await;

    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.call(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["database"]["status"], "up");
    assert_eq!(body["checks"]["cache"]["status"], "up");
}

#[tokio::test]
async fn test_metrics_disabled() {
    let app = app().await;
    let (status, body) = app.call(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
}

// ============================================================================
// Auth and errors
// ============================================================================

#[tokio::test]
async fn test_missing_session_is_unauthorized() {
    let app = app().await;
    let (status, body) = app
        .call(Method::POST, "/api/onboarding", None, Some(onboarding_body("Shop")))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_bad_token_is_unauthorized() {
    let app = app().await;
    let (status, body) = app
        .call(Method::GET, "/api/cart", Some("not.a.jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_malformed_json_uses_error_shape() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/onboarding")
        .header(header::AUTHORIZATION, format!("Bearer {}", app.token(&seller)))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], "INVALID_FORMAT");
}

// ============================================================================
// Onboarding and tenants
// ============================================================================

#[tokio::test]
async fn test_onboarding_then_storefront() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");

    let body = app.onboard(&seller, "Test Store").await;
    assert_eq!(body["success"], true);
    assert_eq!(body["storeSlug"], "test-store");
    assert_eq!(body["alreadyOnboarded"], false);
    assert_eq!(body["emailSent"], true);

    let again = app.onboard(&seller, "Test Store").await;
    assert_eq!(again["alreadyOnboarded"], true);
    assert_eq!(again["tenantId"], body["tenantId"]);

    let (status, view) = app.call(Method::GET, "/api/stores/test-store", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["store"]["slug"], "test-store");
    assert_eq!(view["products"], json!([]));
}

#[tokio::test]
async fn test_onboarding_validation() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");

    let mut body = onboarding_body("Test Store");
    body["data"]["store"]["categories"] = json!([]);

    let (status, error) = app
        .call(Method::POST, "/api/onboarding", Some(&app.token(&seller)), Some(body))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "VALIDATION_ERROR");
    assert_eq!(app.repo.tenant_count().await, 0);
}

#[tokio::test]
async fn test_unknown_storefront() {
    let app = app().await;
    let (status, body) = app.call(Method::GET, "/api/stores/missing", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "STORE_NOT_FOUND");
}

#[tokio::test]
async fn test_admin_creates_tenant() {
    let app = app().await;
    let admin = user(UserRole::SuperAdmin, "ops@vendly.test");
    let request = json!({
        "fullName": "Acme Corp",
        "email": "owner@acme.test",
        "storeName": "Acme Store",
        "categories": ["Tools"]
    });

    let (status, body) = app
        .call(Method::POST, "/api/tenants", Some(&app.token(&admin)), Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["store"]["slug"], "acme-store");
    assert_eq!(body["tenant"]["status"], "onboarding");
    let tenant_slug = body["tenant"]["slug"].as_str().unwrap();
    assert!(Regex::new(r"^acme-corp-[a-z0-9]{4}$").unwrap().is_match(tenant_slug));
    assert_eq!(app.mailer.sent().await.len(), 1);

    let (status, body) = app
        .call(Method::POST, "/api/tenants", Some(&app.token(&admin)), Some(request))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");
}

#[tokio::test]
async fn test_seller_cannot_create_tenant() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");
    let request = json!({
        "fullName": "Acme Corp",
        "email": "owner@acme.test",
        "storeName": "Acme Store",
        "categories": ["Tools"]
    });

    let (status, body) = app
        .call(Method::POST, "/api/tenants", Some(&app.token(&seller)), Some(request))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");
}

#[tokio::test]
async fn test_admin_signup() {
    let app = app().await;
    let request = json!({ "email": "ops@vendly.test", "password": "correct horse", "name": "Ops" });

    let (status, body) = app
        .call(Method::POST, "/api/admin-signup", None, Some(request.clone()))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = app
        .call(Method::POST, "/api/admin-signup", None, Some(request))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "User already exists");
}

// ============================================================================
// Products and cart
// ============================================================================

#[tokio::test]
async fn test_products_need_a_tenant() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");

    let (status, body) = app
        .call(Method::GET, "/api/products", Some(&app.token(&seller)), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TENANT_NOT_FOUND");
}

#[tokio::test]
async fn test_product_lifecycle() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");
    app.onboard(&seller, "Jane Shop").await;
    let token = app.token(&seller);

    let (status, created) = app
        .call(
            Method::POST,
            "/api/products",
            Some(&token),
            Some(json!({ "name": "Mug", "priceCents": 1500, "stockQuantity": 3 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();

    let (_, list) = app.call(Method::GET, "/api/products", Some(&token), None).await;
    assert_eq!(list["products"].as_array().unwrap().len(), 1);

    let (status, updated) = app
        .call(
            Method::PATCH,
            &format!("/api/products/{}", id),
            Some(&token),
            Some(json!({ "priceCents": 1200 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["priceCents"], 1200);

    let (_, view) = app.call(Method::GET, "/api/stores/jane-shop", None, None).await;
    assert_eq!(view["products"][0]["priceCents"], 1200);

    let path = format!("/api/products/{}", id);
    let (status, _) = app.call(Method::DELETE, &path, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = app.call(Method::DELETE, &path, Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "PRODUCT_NOT_FOUND");

    let (_, list) = app.call(Method::GET, "/api/products", Some(&token), None).await;
    assert_eq!(list["products"], json!([]));
}

#[tokio::test]
async fn test_invalid_product_id() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");
    app.onboard(&seller, "Jane Shop").await;

    let (status, body) = app
        .call(Method::DELETE, "/api/products/not-a-uuid", Some(&app.token(&seller)), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_FORMAT");
}

#[tokio::test]
async fn test_cart_flow() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");
    let onboarded = app.onboard(&seller, "Jane Shop").await;
    let store_id = onboarded["storeId"].clone();

    let (_, product) = app
        .call(
            Method::POST,
            "/api/products",
            Some(&app.token(&seller)),
            Some(json!({ "name": "Mug", "priceCents": 1500 })),
        )
        .await;
    let product_id = product["id"].clone();

    let shopper = user(UserRole::Customer, "shopper@example.com");
    let token = app.token(&shopper);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": product_id, "storeId": store_id, "quantity": 2 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["item"]["quantity"], 2);

    let (_, body) = app
        .call(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": product_id, "storeId": store_id, "quantity": 0 })),
        )
        .await;
    assert_eq!(body["item"], Value::Null);

    let (_, body) = app.call(Method::GET, "/api/cart", Some(&token), None).await;
    assert_eq!(body["items"], json!([]));

    let (status, body) = app
        .call(
            Method::POST,
            "/api/cart",
            Some(&token),
            Some(json!({ "productId": product_id, "storeId": store_id, "quantity": 1000 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    app.call(
        Method::POST,
        "/api/cart",
        Some(&token),
        Some(json!({ "productId": product_id, "storeId": store_id, "quantity": 1 })),
    )
    .await;
    let (status, body) = app.call(Method::DELETE, "/api/cart", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removed"], 1);
}

// ============================================================================
// Integrations and site builder
// ============================================================================

#[tokio::test]
async fn test_instagram_sync() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");
    app.onboard(&seller, "Jane Shop").await;
    let token = app.token(&seller);

    let (status, body) = app
        .call(
            Method::POST,
            "/api/integrations/instagram/sync",
            Some(&token),
            Some(json!({ "updateLogo": true })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    app.repo.link_account(seller.user_id, "instagram", "ig-token").await;
    let (status, body) = app
        .call(
            Method::POST,
            "/api/integrations/instagram/sync",
            Some(&token),
            Some(json!({ "updateLogo": true })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["account"]["username"], "janeshop");
    assert_eq!(body["logoUpdated"], true);

    let (_, view) = app.call(Method::GET, "/api/stores/jane-shop", None, None).await;
    assert_eq!(view["store"]["logoUrl"], "https://cdn.instagram.test/jane.jpg");
}

#[tokio::test]
async fn test_unknown_platform() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");
    app.onboard(&seller, "Jane Shop").await;

    let (status, body) = app
        .call(
            Method::POST,
            "/api/integrations/myspace/sync",
            Some(&app.token(&seller)),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_site_builder_job() {
    let app = app().await;
    let seller = user(UserRole::Seller, "jane@example.com");
    app.onboard(&seller, "Jane Shop").await;
    let token = app.token(&seller);

    let (status, job) = app
        .call(
            Method::POST,
            "/api/site-builder/jobs",
            Some(&token),
            Some(json!({ "prompt": "clean and calm" })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let uri = format!("/api/site-builder/jobs/{}", job["id"].as_str().unwrap());

    let mut last = Value::Null;
    for _ in 0..200 {
        let (status, body) = app.call(Method::GET, &uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        if body["status"] == "completed" || body["status"] == "failed" {
            last = body;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(last["status"], "completed");
    assert_eq!(last["design"]["theme"], "minimal");

    let other = user(UserRole::Seller, "john@example.com");
    app.onboard(&other, "John Shop").await;
    let (status, body) = app.call(Method::GET, &uri, Some(&app.token(&other)), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "JOB_NOT_FOUND");
}

// ============================================================================
// Rate limiting
// ============================================================================

#[tokio::test]
async fn test_rate_limit() {
    let mut config = AppConfig::default();
    config.auth.jwt_secret = SECRET.to_string();
    config.rate_limit.enabled = true;
    config.rate_limit.requests_per_second = 1;
    config.rate_limit.burst = 1;
    let app = app_with(config).await;

    let (first, _) = app.call(Method::GET, "/api/stores/missing", None, None).await;
    assert_eq!(first, StatusCode::NOT_FOUND);

    let (second, body) = app.call(Method::GET, "/api/stores/missing", None, None).await;
    assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");

    // health checks sit outside the limiter
    let (status, _) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
