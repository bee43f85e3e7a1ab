//! Prometheus metrics for rent-service.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, Encoder, IntCounter, IntCounterVec,
    TextEncoder,
};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Ledger transitions by event and outcome.
pub static LEDGER_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rent_ledger_transitions_total",
        "Payment ledger transitions by event and outcome",
        &["event", "outcome"]
    )
    .expect("Failed to register rent_ledger_transitions_total")
});

/// Sum of confirmed rent, in the smallest currency unit.
pub static CONFIRMED_AMOUNT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "rent_confirmed_amount_total",
        "Total confirmed rent in the smallest currency unit"
    )
    .expect("Failed to register rent_confirmed_amount_total")
});

/// Access gate denials by kind (unauthenticated, forbidden).
pub static ACCESS_DENIALS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "rent_access_denials_total",
        "Requests denied by the access gate",
        &["kind"]
    )
    .expect("Failed to register rent_access_denials_total")
});

/// Install the recorder behind the `metrics` facade used by the HTTP middleware.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics handle already initialized"))?;

    Ok(())
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default();

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_ok() {
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

pub fn record_transition(event: &str, outcome: &str) {
    LEDGER_TRANSITIONS_TOTAL
        .with_label_values(&[event, outcome])
        .inc();
}

pub fn record_confirmed_amount(amount: u64) {
    CONFIRMED_AMOUNT_TOTAL.inc_by(amount);
}

pub fn record_denial(kind: &str) {
    ACCESS_DENIALS_TOTAL.with_label_values(&[kind]).inc();
}
