//! POST client for service-to-service calls.

mod client;
mod error;
mod metrics;

pub use client::{HttpPostClient, PostClient, PostResponse, is_empty_timeout};
pub use error::{IntegrationError, classify, is_conn_refused, is_deadline_exceeded, known_error};
pub use metrics::{
    CODE_LABEL, FAILED_CODES_METRIC, LATENCY_METRIC, MetricsSink, RecorderSink, SUCCESS_LABEL,
    URL_LABEL, describe_metrics, is_failed_http_code,
};
