use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;
use std::time::Duration;

/// Timeout applied when a call passes a zero timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on establishing a TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Idle connections kept open per destination host.
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 50;

/// Settings for the underlying HTTP agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Timeout for calls that pass a zero timeout. Zero selects [`DEFAULT_TIMEOUT`].
    pub default_timeout: Duration,
    /// Timeout for establishing each connection.
    pub connect_timeout: Duration,
    /// Maximum idle pooled connections per host.
    pub pool_max_idle_per_host: usize,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            user_agent: format!("intercall/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Sets the timeout for calls that pass a zero timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the idle pool size per host.
    pub fn with_pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Sets the `User-Agent` header.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Builds the pooled agent shared by every call made through it.
    pub fn build_client(&self) -> Result<Client> {
        debug!(
            "Building HTTP agent: connect_timeout={:?}, pool_max_idle_per_host={}, user_agent={}",
            self.connect_timeout, self.pool_max_idle_per_host, self.user_agent
        );

        Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout)
            .pool_max_idle_per_host(self.pool_max_idle_per_host)
            .build()
            .context("Failed to build HTTP client")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.default_timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.pool_max_idle_per_host, 50);
        assert!(config.user_agent.starts_with("intercall/"));
    }

    #[test]
    fn test_setters() {
        let config = ClientConfig::default()
            .with_default_timeout(Duration::from_millis(250))
            .with_connect_timeout(Duration::from_millis(100))
            .with_pool_max_idle_per_host(4)
            .with_user_agent("billing-service");

        assert_eq!(config.default_timeout, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_millis(100));
        assert_eq!(config.pool_max_idle_per_host, 4);
        assert_eq!(config.user_agent, "billing-service");
    }

    // the configured user agent should be sent with every request
    #[tokio::test]
    async fn test_build_client_sets_user_agent() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("user-agent", "billing-service")
            .with_status(204)
            .create_async()
            .await;

        let client = ClientConfig::default()
            .with_user_agent("billing-service")
            .build_client()
            .unwrap();
        let response = client.post(server.url()).send().await.unwrap();

        mock.assert_async().await;
        assert_eq!(response.status(), 204);
    }
}
