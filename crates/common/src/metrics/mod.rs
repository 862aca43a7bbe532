//! Prometheus metrics
//!
//! Names are prefixed with `vendly_`. Descriptions are registered once at
//! startup; the recording helpers are cheap no-ops when no recorder is
//! installed (unit tests).

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Vendly metrics
pub const METRICS_PREFIX: &str = "vendly";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000, 2.500, 5.000, 10.00,
];

/// Buckets for LLM calls, which run for seconds rather than milliseconds
pub const GENERATION_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0];

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    describe_counter!(
        format!("{}_onboarding_total", METRICS_PREFIX),
        Unit::Count,
        "Onboarding and provisioning outcomes"
    );

    describe_counter!(
        format!("{}_emails_total", METRICS_PREFIX),
        Unit::Count,
        "Outgoing emails by template and status"
    );

    describe_counter!(
        format!("{}_site_builder_jobs_total", METRICS_PREFIX),
        Unit::Count,
        "Site builder jobs by final status"
    );

    describe_histogram!(
        format!("{}_site_builder_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Site generation latency in seconds"
    );

    describe_counter!(
        format!("{}_social_syncs_total", METRICS_PREFIX),
        Unit::Count,
        "Social profile syncs by platform and status"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Record a cache lookup; `namespace` is the first key segment
pub fn record_cache(hit: bool, namespace: &str) {
    let name = if hit { "cache_hits_total" } else { "cache_misses_total" };
    counter!(
        format!("{}_{}", METRICS_PREFIX, name),
        "namespace" => namespace.to_string()
    )
    .increment(1);
}

/// `kind` is `self_service` or `admin`, `outcome` is `created`, `existing` or `error`
pub fn record_onboarding(kind: &str, outcome: &str) {
    counter!(
        format!("{}_onboarding_total", METRICS_PREFIX),
        "kind" => kind.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_email(template: &str, sent: bool) {
    counter!(
        format!("{}_emails_total", METRICS_PREFIX),
        "template" => template.to_string(),
        "status" => if sent { "sent" } else { "failed" }.to_string()
    )
    .increment(1);
}

pub fn record_site_job(status: &str, duration_secs: f64) {
    counter!(
        format!("{}_site_builder_jobs_total", METRICS_PREFIX),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(format!("{}_site_builder_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

pub fn record_social_sync(platform: &str, success: bool) {
    counter!(
        format!("{}_social_syncs_total", METRICS_PREFIX),
        "platform" => platform.to_string(),
        "status" => if success { "success" } else { "error" }.to_string()
    )
    .increment(1);
}
