//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Contract queries by intent and outcome
//! - Submissions and confirmations
//! - Confirmation polling
//! - Chain height

use crate::contract::RequestKind;
use crate::error::{GatewayError, GatewayResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    // Query metrics
    pub static ref QUERIES: CounterVec = register_counter_vec!(
        "tictactoe_queries_total",
        "Contract queries by intent and outcome",
        &["query", "outcome"]
    ).unwrap();

    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "tictactoe_transactions_submitted_total",
        "Transactions accepted by the signer",
        &["kind"]
    ).unwrap();

    pub static ref TX_SUBMISSION_FAILED: CounterVec = register_counter_vec!(
        "tictactoe_transactions_submission_failed_total",
        "Transactions rejected before broadcast",
        &["kind"]
    ).unwrap();

    pub static ref TX_CONFIRMED: Counter = register_counter!(
        "tictactoe_transactions_confirmed_total",
        "Transactions found on chain"
    ).unwrap();

    pub static ref TX_QUEUED: Counter = register_counter!(
        "tictactoe_transactions_queued_total",
        "Transactions still unresolved at the poll deadline"
    ).unwrap();

    pub static ref TX_IN_FLIGHT: Gauge = register_gauge!(
        "tictactoe_transactions_in_flight",
        "Submitted transactions awaiting confirmation"
    ).unwrap();

    pub static ref CONFIRMATION_LATENCY: Histogram = register_histogram!(
        "tictactoe_confirmation_latency_seconds",
        "Time from first poll to confirmation",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 600.0, 3600.0]
    ).unwrap();

    pub static ref POLL_ATTEMPTS: Counter = register_counter!(
        "tictactoe_poll_attempts_total",
        "Transaction lookups made while polling"
    ).unwrap();

    // Chain metrics
    pub static ref CHAIN_HEIGHT: Gauge = register_gauge!(
        "tictactoe_chain_block_height",
        "Latest block height seen on the LCD"
    ).unwrap();

    // Health metrics
    pub static ref HEALTH_CHECK_SUCCESS: Counter = register_counter!(
        "tictactoe_health_check_success_total",
        "Total successful health checks"
    ).unwrap();

    pub static ref HEALTH_CHECK_FAILURE: Counter = register_counter!(
        "tictactoe_health_check_failure_total",
        "Total failed health checks"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> GatewayResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| GatewayError::Config(format!("Cannot bind metrics port {}: {}", self.port, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| GatewayError::Internal(format!("Metrics server stopped: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    render().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Encode the default registry in the text exposition format
pub fn render() -> GatewayResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| GatewayError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| GatewayError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_query(query: &str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    QUERIES.with_label_values(&[query, outcome]).inc();
}

pub fn record_tx_submitted(kind: RequestKind) {
    TX_SUBMITTED.with_label_values(&[kind.as_str()]).inc();
}

pub fn record_submission_failed(kind: RequestKind) {
    TX_SUBMISSION_FAILED.with_label_values(&[kind.as_str()]).inc();
}

pub fn record_poll_attempt() {
    POLL_ATTEMPTS.inc();
}

pub fn record_tx_confirmed(latency_secs: f64) {
    TX_CONFIRMED.inc();
    CONFIRMATION_LATENCY.observe(latency_secs);
}

pub fn record_tx_queued() {
    TX_QUEUED.inc();
}

pub fn record_in_flight(count: usize) {
    TX_IN_FLIGHT.set(count as f64);
}

pub fn record_chain_height(height: u64) {
    CHAIN_HEIGHT.set(height as f64);
}

pub fn record_health_check(healthy: bool) {
    if healthy {
        HEALTH_CHECK_SUCCESS.inc();
    } else {
        HEALTH_CHECK_FAILURE.inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        record_query("get_games", true);
        record_tx_submitted(RequestKind::MakeMove);
        record_chain_height(42);

        let text = render().unwrap();
        assert!(text.contains("tictactoe_queries_total"));
        assert!(text.contains("kind=\"make_move\""));
        assert!(text.contains("tictactoe_chain_block_height"));
    }
}
