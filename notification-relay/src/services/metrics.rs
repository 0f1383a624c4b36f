//! Metrics collection for notification-relay.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use service_core::error::AppError;
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<(), AppError> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("failed to install Prometheus recorder: {}", e))
    })?;

    METRICS_HANDLE.set(handle).map_err(|_| {
        AppError::InternalError(anyhow::anyhow!("metrics handle already initialized"))
    })
}

/// Render metrics in Prometheus text format for `/metrics`.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

pub fn record_message_received() {
    metrics::counter!("relay_messages_received_total").increment(1);
}

pub fn record_receive_error(kind: &'static str) {
    metrics::counter!("relay_receive_errors_total", "kind" => kind).increment(1);
}

pub fn record_store_error(op: &'static str) {
    metrics::counter!("relay_store_errors_total", "op" => op).increment(1);
}

pub fn record_history_read(status: &'static str) {
    metrics::counter!("relay_history_reads_total", "status" => status).increment(1);
}
