//! Latency and failed-status reporting for outgoing calls.
//!
//! The client only produces events; where they end up is decided by the
//! recorder the host process installs for the `metrics` facade.

use reqwest::StatusCode;
use std::time::Duration;

/// Histogram of request latency in seconds, labelled by `url` and `success`.
pub const LATENCY_METRIC: &str = "http_latency";

/// Counter of responses carrying a failed status, labelled by `url` and `code`.
pub const FAILED_CODES_METRIC: &str = "failed_http_codes";

pub const URL_LABEL: &str = "url";
pub const CODE_LABEL: &str = "code";
pub const SUCCESS_LABEL: &str = "success";

/// Receiver for the events produced by [`super::HttpPostClient`].
#[cfg_attr(test, mockall::automock)]
pub trait MetricsSink: Send + Sync {
    /// Called once per executed request. `success` is false on transport failure.
    fn record_latency(&self, url: &str, latency: Duration, success: bool);

    /// Called when a response arrives with a failed status.
    fn record_status(&self, url: &str, status: StatusCode);
}

/// Forwards events to the globally installed `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecorderSink;

impl MetricsSink for RecorderSink {
    fn record_latency(&self, url: &str, latency: Duration, success: bool) {
        metrics::histogram!(
            LATENCY_METRIC,
            URL_LABEL => url.to_string(),
            SUCCESS_LABEL => success.to_string()
        )
        .record(latency.as_secs_f64());
    }

    fn record_status(&self, url: &str, status: StatusCode) {
        metrics::counter!(
            FAILED_CODES_METRIC,
            URL_LABEL => url.to_string(),
            CODE_LABEL => status.as_u16().to_string()
        )
        .increment(1);
    }
}

/// Registers units and descriptions for both metrics with the installed
/// recorder. Call once after installing it.
pub fn describe_metrics() {
    metrics::describe_histogram!(
        LATENCY_METRIC,
        metrics::Unit::Seconds,
        "http requests latency"
    );
    metrics::describe_counter!(
        FAILED_CODES_METRIC,
        metrics::Unit::Count,
        "failed http codes counter"
    );
}

/// Any status outside 2xx counts as failed.
pub fn is_failed_http_code(status: StatusCode) -> bool {
    !status.is_success()
}
