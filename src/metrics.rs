//! Prometheus metrics for the security and caching layers.
//!
//! Metrics are exposed on a dedicated HTTP listener when `METRICS_PORT` is
//! non-zero. Recording functions are safe to call without an installed
//! recorder; they become no-ops.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `site_admission_rejections_total` - Login attempts rejected by the admission controller
//! - `site_auth_failures_total` - Bearer authentication failures (label: reason)
//! - `site_conditional_responses_total` - Fingerprinted responses (label: outcome = hit | miss)
//! - `site_tokens_issued_total` - Session tokens issued (label: kind = login | refresh | password_change)
//!
//! ## Gauges
//! - `site_admission_tracked_clients` - Client records held by the admission controller

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const ADMISSION_REJECTIONS_TOTAL: &str = "site_admission_rejections_total";
    pub const AUTH_FAILURES_TOTAL: &str = "site_auth_failures_total";
    pub const CONDITIONAL_RESPONSES_TOTAL: &str = "site_conditional_responses_total";
    pub const TOKENS_ISSUED_TOTAL: &str = "site_tokens_issued_total";
    pub const ADMISSION_TRACKED_CLIENTS: &str = "site_admission_tracked_clients";
}

/// Install the Prometheus exporter and describe every metric.
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::ADMISSION_REJECTIONS_TOTAL,
        "Total number of login attempts rejected by admission control"
    );
    describe_counter!(
        names::AUTH_FAILURES_TOTAL,
        "Total number of bearer authentication failures"
    );
    describe_counter!(
        names::CONDITIONAL_RESPONSES_TOTAL,
        "Total number of fingerprinted responses by cache outcome"
    );
    describe_counter!(
        names::TOKENS_ISSUED_TOTAL,
        "Total number of session tokens issued"
    );
    describe_gauge!(
        names::ADMISSION_TRACKED_CLIENTS,
        "Number of clients currently tracked by admission control"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Try to initialize metrics, logging any errors but not failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_admission_rejection() {
    counter!(names::ADMISSION_REJECTIONS_TOTAL).increment(1);
}

pub fn record_auth_failure(reason: &'static str) {
    counter!(names::AUTH_FAILURES_TOTAL, "reason" => reason).increment(1);
}

pub fn record_conditional_response(outcome: &'static str) {
    counter!(names::CONDITIONAL_RESPONSES_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_token_issued(kind: &'static str) {
    counter!(names::TOKENS_ISSUED_TOTAL, "kind" => kind).increment(1);
}

/// Update the tracked-clients gauge.
pub fn set_admission_tracked_clients(count: usize) {
    #[allow(clippy::cast_precision_loss)]
    gauge!(names::ADMISSION_TRACKED_CLIENTS).set(count as f64);
}
