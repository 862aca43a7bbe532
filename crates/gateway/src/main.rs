//! Vendly API Gateway binary

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use vendly_common::{
    auth::HttpAuthProvider,
    cache::CacheLayer,
    config::{AppConfig, ObservabilityConfig},
    db::DbPool,
    integrations::HttpSocialClient,
    metrics::{self, GENERATION_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    notify::create_mailer,
    site_builder::OpenAiSiteGenerator,
    MemoryRepository, PgRepository, Repository,
};
use vendly_gateway::{create_router, AppState, Dependencies};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("failed to load configuration")?;

    init_tracing(&config.observability);
    info!("Starting Vendly API Gateway v{}", vendly_common::VERSION);

    let metrics_handle = if config.observability.metrics_enabled {
        Some(init_metrics()?)
    } else {
        None
    };

    let repo: Arc<dyn Repository> = if config.uses_memory_database() {
        warn!("Using the in-memory repository; data is lost on restart");
        Arc::new(MemoryRepository::new())
    } else {
        info!("Connecting to database...");
        let pool = DbPool::new(&config.database).await?;
        if config.database.run_migrations {
            pool.migrate().await?;
            info!("Database migrations applied");
        }
        Arc::new(PgRepository::new(pool))
    };

    let cache = CacheLayer::from_settings(&config.cache).await;
    if !cache.is_enabled() {
        info!("Cache not configured, reads go straight to the database");
    }

    let deps = Dependencies {
        repo,
        cache,
        mailer: create_mailer(&config.email)?,
        auth_provider: Arc::new(HttpAuthProvider::new(
            &config.auth.provider_url,
            config.request_timeout(),
        )?),
        social_client: Arc::new(HttpSocialClient::new(&config.integrations)?),
        site_generator: Arc::new(OpenAiSiteGenerator::new(&config.site_builder)?),
        metrics: metrics_handle,
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, deps);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// `RUST_LOG` wins over `observability.log_level`
fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_request_duration_seconds", METRICS_PREFIX)),
            LATENCY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_site_builder_duration_seconds", METRICS_PREFIX)),
            GENERATION_BUCKETS,
        )?
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    metrics::register_metrics();
    info!("Prometheus metrics initialized");
    Ok(handle)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
