// Metrics and observability module
// This file handles collection and reporting of router execution metrics
//

use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Encoder, Histogram,
    IntCounter, IntCounterVec, TextEncoder,
};

pub static TRADES: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "router_trades_total",
        "executeTrades calls by outcome",
        &["outcome"]
    )
    .expect("register router_trades_total")
});

pub static LEG_EXECUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "router_leg_executions_total",
        "delegated leg executions by module and outcome",
        &["module", "outcome"]
    )
    .expect("register router_leg_executions_total")
});

pub static RESIDUAL_VIOLATIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "router_residual_violations_total",
        "batches reverted for leaving custody balances behind"
    )
    .expect("register router_residual_violations_total")
});

pub static TRADE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "router_trade_latency_seconds",
        "wall time of executeTrades"
    )
    .expect("register router_trade_latency_seconds")
});

/// Render the default registry in the Prometheus text format.
pub fn render() -> String {
    let mut buf = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&prometheus::gather(), &mut buf) {
        tracing::warn!(error = %err, "metrics encoding failed");
    }
    String::from_utf8(buf).unwrap_or_default()
}
