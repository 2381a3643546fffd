//! Prometheus metrics for Guardette.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `guardette_requests_total` | Counter | `outcome`, `status` | Proxied calls |
//! | `guardette_request_duration_seconds` | Histogram | `outcome` | Call latency |
//! | `guardette_secret_fetches_total` | Counter | `result` | Secret backend fetches |
//!
//! Recording before [`init_metrics`] is a no-op.

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder.
///
/// The recorder is rendered on demand through [`render_metrics`]; no
/// listener is started. Calling this more than once is harmless.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if another recorder is installed.
pub fn init_metrics() -> TelemetryResult<()> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "guardette_requests_total",
        "Total number of proxied calls by outcome"
    );
    describe_histogram!(
        "guardette_request_duration_seconds",
        "Proxied call duration in seconds"
    );
    describe_counter!(
        "guardette_secret_fetches_total",
        "Secret backend fetches (cache misses)"
    );
}

/// Records a completed call.
///
/// `outcome` is `proxied` for upstream-produced responses, otherwise the gateway
/// error category.
pub fn record_request(outcome: &str, status_code: u16, duration: Duration) {
    counter!(
        "guardette_requests_total",
        "outcome" => outcome.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(
        "guardette_request_duration_seconds",
        "outcome" => outcome.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Records one fetch against the secret backend.
pub fn record_secret_fetch(success: bool) {
    counter!(
        "guardette_secret_fetches_total",
        "result" => if success { "ok" } else { "error" }
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_functions_dont_panic() {
        record_request("proxied", 200, Duration::from_millis(10));
        record_request("timeout", 500, Duration::from_secs(30));
        record_secret_fetch(true);
        record_secret_fetch(false);
    }

    #[test]
    fn test_render_after_init() {
        init_metrics().unwrap();
        init_metrics().unwrap();

        record_request("proxied", 200, Duration::from_millis(5));
        let rendered = render_metrics().unwrap();
        assert!(rendered.contains("guardette_requests_total"));
    }
}
