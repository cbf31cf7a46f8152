//! Prometheus metrics for the Sigwarden worker.
//!
//! Exposes counters for message handling, the invalidation cascade and
//! alerts, plus the number of messages currently in flight.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no package ids or thumbprints, only aggregate counts.
//! Restrict the endpoint to scraper addresses at the network level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Message metrics
pub static MESSAGES_HANDLED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sigwarden_messages_handled_total",
            "Total messages handled by topic and outcome",
        ),
        &["topic", "outcome"],
    )
    .expect("metric creation failed")
});

pub static MESSAGES_DEAD_LETTERED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sigwarden_messages_dead_lettered_total",
            "Total messages parked instead of delivered",
        ),
        &["topic"],
    )
    .expect("metric creation failed")
});

pub static MESSAGES_IN_FLIGHT: LazyLock<IntGaugeVec> = LazyLock::new(|| {
    IntGaugeVec::new(
        Opts::new(
            "sigwarden_messages_in_flight",
            "Messages currently being handled",
        ),
        &["topic"],
    )
    .expect("metric creation failed")
});

// Certificate metrics
pub static CERTIFICATE_TRANSITIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sigwarden_certificate_transitions_total",
            "Total certificate verdicts applied by resulting status",
        ),
        &["status"],
    )
    .expect("metric creation failed")
});

pub static CERTIFICATE_CONFLICTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sigwarden_certificate_conflicts_total",
        "Total certificate verdicts abandoned on a concurrent write",
    )
    .expect("metric creation failed")
});

pub static SIGNATURES_INVALIDATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "sigwarden_signatures_invalidated_total",
        "Total package signatures invalidated by the cascade",
    )
    .expect("metric creation failed")
});

// Acceptance metrics
pub static ACCEPTANCE_DECISIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "sigwarden_acceptance_decisions_total",
            "Total signature acceptance decisions by validator state",
        ),
        &["state"],
    )
    .expect("metric creation failed")
});

// Alert metrics
pub static ALERTS_FIRED: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("sigwarden_alerts_fired_total", "Total alerts fired by kind"),
        &["kind"],
    )
    .expect("metric creation failed")
});

static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(MESSAGES_HANDLED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MESSAGES_DEAD_LETTERED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MESSAGES_IN_FLIGHT.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CERTIFICATE_TRANSITIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CERTIFICATE_CONFLICTS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(SIGNATURES_INVALIDATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ACCEPTANCE_DECISIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(ALERTS_FIRED.clone()))
            .expect("metric registration failed");
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Helper to record a handled message by outcome.
pub fn record_message_outcome(topic: &str, outcome: &str) {
    MESSAGES_HANDLED.with_label_values(&[topic, outcome]).inc();
}
