//! # HTTP Client Factory
//!
//! Builds the outbound HTTP client used by the cloud metric reporter, with the
//! timeouts and optional HTTPS proxy taken from the reporter settings.

use crate::error::MonitoringError;
use reqwest::{Client, Proxy};
use std::time::Duration;

/// HTTP client pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_idle_per_host: usize,
    pub idle_timeout: Duration,
    pub keepalive: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 2,
            idle_timeout: Duration::from_secs(90),
            keepalive: Some(Duration::from_secs(60)),
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub pool: PoolConfig,
    pub https_proxy: Option<String>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool: PoolConfig::default(),
            https_proxy: None,
        }
    }
}

/// HTTP client builder with configurable options
pub struct HttpClientBuilder {
    config: HttpClientConfig,
}

impl HttpClientBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpClientConfig::default(),
        }
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Route HTTPS requests through `proxy`.
    pub fn https_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.config.https_proxy = Some(proxy.into());
        self
    }

    pub fn build(self) -> Result<Client, MonitoringError> {
        let mut builder = Client::builder()
            .timeout(self.config.timeout)
            .connect_timeout(self.config.connect_timeout)
            .pool_max_idle_per_host(self.config.pool.max_idle_per_host)
            .pool_idle_timeout(self.config.pool.idle_timeout);

        if let Some(keepalive) = self.config.pool.keepalive {
            builder = builder.tcp_keepalive(keepalive);
        }

        if let Some(proxy) = &self.config.https_proxy {
            let proxy = Proxy::https(proxy.as_str())
                .map_err(|e| MonitoringError::Config(format!("Invalid HTTPS proxy '{}': {}", proxy, e)))?;
            builder = builder.proxy(proxy);
        }

        builder.build().map_err(MonitoringError::from)
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
