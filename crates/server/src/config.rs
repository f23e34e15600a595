//! HTTP server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::error::{Result, ServerError};

/// Default ports
pub mod ports {
    /// HTTP API port
    pub const HTTP: u16 = 8080;
    /// Prometheus exporter port
    pub const METRICS: u16 = 9090;
}

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how the HTTP server listens
///
/// ```
/// use server::config::ServerConfig;
///
/// let config = ServerConfig::new("127.0.0.1", 8080);
/// assert_eq!(config.http_addr().unwrap().port(), 8080);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// HTTP port; 0 asks the OS for an ephemeral port
    pub http_port: u16,
    /// Requests running longer than this are answered with 408
    pub request_timeout: Duration,
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, http_port: u16) -> Self {
        Self {
            host: host.into(),
            http_port,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Loopback on an ephemeral port, for tests
    pub fn ephemeral() -> Self {
        Self::new("127.0.0.1", 0)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Socket address to bind
    pub fn http_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.http_port)
            .parse()
            .map_err(|_| ServerError::InvalidAddress(format!("{}:{}", self.host, self.http_port)))
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("0.0.0.0", ports::HTTP)
    }
}
