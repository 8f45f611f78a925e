//! Prometheus metrics registry and instruments.
//!
//! This module is framework-agnostic and can be used from any layer.

use lazy_static::lazy_static;
use prometheus::{IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Once;

lazy_static! {
    /// Global Prometheus registry
    pub static ref REGISTRY: Registry = Registry::new();

    // Authority Metrics
    pub static ref LOGIN_ATTEMPTS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("oauth_gate_login_attempts_total", "Login attempts by protocol step and outcome"),
        &["step", "outcome"]
    ).expect("metric can be created");
    pub static ref PENDING_ATTEMPTS: IntGauge = IntGauge::new(
        "oauth_gate_pending_attempts",
        "Current number of live login attempts in the correlation store"
    ).expect("metric can be created");

    // Gate Metrics
    pub static ref GATE_DECISIONS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("oauth_gate_decisions_total", "Per-request decisions taken by the gate"),
        &["decision"]
    ).expect("metric can be created");

    // Error Metrics
    pub static ref ERRORS_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("oauth_gate_errors_total", "Total number of errors"),
        &["error_type"]
    ).expect("metric can be created");
}

static INIT: Once = Once::new();

/// Initialize metrics registry.
///
/// Safe to call more than once; registration happens on the first call only.
pub fn init_metrics() {
    INIT.call_once(|| {
        REGISTRY
            .register(Box::new(LOGIN_ATTEMPTS_TOTAL.clone()))
            .expect("LOGIN_ATTEMPTS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(PENDING_ATTEMPTS.clone()))
            .expect("PENDING_ATTEMPTS can be registered");
        REGISTRY
            .register(Box::new(GATE_DECISIONS_TOTAL.clone()))
            .expect("GATE_DECISIONS_TOTAL can be registered");
        REGISTRY
            .register(Box::new(ERRORS_TOTAL.clone()))
            .expect("ERRORS_TOTAL can be registered");

        tracing::info!("Metrics registry initialized");
    });
}
