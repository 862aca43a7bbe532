//! Vendly API Gateway
//!
//! HTTP surface of the platform. Handles:
//! - Session authentication and tenant resolution
//! - Rate limiting
//! - Request routing to the domain services
//! - Observability (logging, metrics, request ids)

pub mod handlers;
pub mod middleware;

use axum::{
    extract::FromRef,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use vendly_common::{
    auth::{AuthProvider, JwtManager},
    cache::CacheLayer,
    cart::CartService,
    catalog::CatalogService,
    config::AppConfig,
    integrations::{IntegrationService, SocialProfileClient},
    notify::DynMailer,
    onboarding::OnboardingService,
    site_builder::{SiteBuilder, SiteGenerator},
    Repository,
};

/// Outbound clients and stores the services are built from
pub struct Dependencies {
    pub repo: Arc<dyn Repository>,
    pub cache: CacheLayer,
    pub mailer: DynMailer,
    pub auth_provider: Arc<dyn AuthProvider>,
    pub social_client: Arc<dyn SocialProfileClient>,
    pub site_generator: Arc<dyn SiteGenerator>,
    pub metrics: Option<PrometheusHandle>,
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repo: Arc<dyn Repository>,
    pub cache: CacheLayer,
    pub jwt: Arc<JwtManager>,
    pub onboarding: OnboardingService,
    pub catalog: CatalogService,
    pub cart: CartService,
    pub integrations: IntegrationService,
    pub site_builder: SiteBuilder,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: AppConfig, deps: Dependencies) -> Self {
        let jwt = Arc::new(JwtManager::new(
            &config.auth.jwt_secret,
            config.auth.jwt_expiration_secs,
        ));

        let onboarding = OnboardingService::new(
            deps.repo.clone(),
            deps.mailer,
            deps.auth_provider,
            config.app.clone(),
            config.auth.verification_ttl_hours,
        );
        let catalog = CatalogService::new(
            deps.repo.clone(),
            deps.cache.clone(),
            config.cache.default_ttl_secs,
        );
        let cart = CartService::new(deps.repo.clone());
        let integrations =
            IntegrationService::new(deps.repo.clone(), deps.cache.clone(), deps.social_client);
        let site_builder =
            SiteBuilder::new(deps.repo.clone(), deps.cache.clone(), deps.site_generator)
                .with_retention(Duration::from_secs(config.site_builder.job_retention_secs));

        Self {
            config: Arc::new(config),
            repo: deps.repo,
            cache: deps.cache,
            jwt,
            onboarding,
            catalog,
            cart,
            integrations,
            site_builder,
            metrics: deps.metrics,
        }
    }
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let mut api_routes = Router::new()
        .route("/admin-signup", post(handlers::signup::admin_signup))
        .route("/tenants", post(handlers::tenants::create_tenant))
        .route("/onboarding", post(handlers::onboarding::complete_onboarding))
        .route(
            "/products",
            get(handlers::products::list_products).post(handlers::products::create_product),
        )
        .route(
            "/products/{id}",
            patch(handlers::products::update_product).delete(handlers::products::delete_product),
        )
        .route("/stores/{slug}", get(handlers::stores::storefront))
        .route(
            "/cart",
            get(handlers::cart::list_cart)
                .post(handlers::cart::upsert_item)
                .delete(handlers::cart::remove_items),
        )
        .route(
            "/integrations/{platform}/sync",
            post(handlers::integrations::sync_profile),
        )
        .route("/site-builder/jobs", post(handlers::site_builder::start_job))
        .route("/site-builder/jobs/{id}", get(handlers::site_builder::get_job));

    let rate_limit = &state.config.rate_limit;
    if rate_limit.enabled {
        let limiter =
            middleware::rate_limit::create_rate_limiter(rate_limit.requests_per_second, rate_limit.burst);
        api_routes = api_routes.layer(from_fn_with_state(
            limiter,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    let timeout = state.config.request_timeout();

    Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .route("/metrics", get(handlers::health::metrics))
        .nest("/api", api_routes)
        .route_layer(from_fn(middleware::metrics::track_requests))
        .layer(TimeoutLayer::new(timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}
