//! POST client with deadline handling, error classification and metrics.

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Request, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::classify;
use super::metrics::{MetricsSink, is_failed_http_code};
use crate::config::{ClientConfig, DEFAULT_TIMEOUT};

/// Status and body of a completed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Sends POST requests to other services.
///
/// A zero `timeout` means "use the client's default". Transport failures
/// that are recognised come back as [`super::IntegrationError`]; a response
/// with a failed status is still `Ok`.
#[async_trait]
pub trait PostClient: Send + Sync {
    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<PostResponse>;
}

/// [`PostClient`] backed by a pooled `reqwest` agent.
#[derive(Clone)]
pub struct HttpPostClient {
    client: Client,
    default_timeout: Duration,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl HttpPostClient {
    /// Wraps an existing agent. No metrics are reported until
    /// [`HttpPostClient::with_metrics`] is called.
    /// A zero `default_timeout` is replaced by [`DEFAULT_TIMEOUT`].
    pub fn new(client: Client, default_timeout: Duration) -> Self {
        let default_timeout = if is_empty_timeout(default_timeout) {
            warn!(
                "Zero default timeout requested, using {:?}",
                DEFAULT_TIMEOUT
            );
            DEFAULT_TIMEOUT
        } else {
            default_timeout
        };

        Self {
            client,
            default_timeout,
            metrics: None,
        }
    }

    /// Creates a client with an agent built from `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Ok(Self::new(config.build_client()?, config.default_timeout))
    }

    /// Reports latency and failed statuses of every call to `sink`.
    pub fn with_metrics(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    /// Returns the timeout used for calls that pass a zero timeout.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Returns `timeout`, or the default when it is zero.
    pub fn choose_timeout(&self, timeout: Duration) -> Duration {
        if is_empty_timeout(timeout) {
            self.default_timeout
        } else {
            timeout
        }
    }

    fn make_post_request(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<Request> {
        let mut header_map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid header name: {:?}", name))?;
            let header_value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for header {}", name))?;
            header_map.insert(header_name, header_value);
        }

        self.client
            .post(url)
            .headers(header_map)
            .body(body)
            .timeout(timeout)
            .build()
            .with_context(|| format!("Failed to build POST request for {}", url))
    }

    /// Executes the request and reads the whole body under the request deadline.
    async fn send(&self, request: Request) -> reqwest::Result<(StatusCode, Vec<u8>)> {
        let response = self.client.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }

    fn record_latency(&self, url: &str, latency: Duration, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_latency(url, latency, success);
        }
    }

    fn record_status(&self, url: &str, status: StatusCode) {
        if let Some(metrics) = &self.metrics {
            metrics.record_status(url, status);
        }
    }
}

#[async_trait]
impl PostClient for HttpPostClient {
    #[tracing::instrument(skip(self, headers, body))]
    async fn post(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        body: Vec<u8>,
        timeout: Duration,
    ) -> Result<PostResponse> {
        let timeout = self.choose_timeout(timeout);
        let request = self.make_post_request(url, headers, body, timeout)?;

        debug!("POST {} (timeout={:?})...", url, timeout);

        let start = Instant::now();
        let result = self.send(request).await;
        self.record_latency(url, start.elapsed(), result.is_ok());

        let (status, body) = result
            .map_err(|e| {
                let err = classify(e);
                warn!("POST {} failed: {}", url, err);
                err
            })
            .with_context(|| format!("POST {} failed: timeout={:?}", url, timeout))?;

        if is_failed_http_code(status) {
            debug!("POST {} returned failed status {}", url, status);
            self.record_status(url, status);
        }

        Ok(PostResponse { status, body })
    }
}

/// Returns true if `timeout` means "not set".
pub fn is_empty_timeout(timeout: Duration) -> bool {
    timeout.is_zero()
}
