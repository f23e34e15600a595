//! Port checks run before start-up
//!
//! A successful check does not reserve the port; the later bind is what
//! counts. The check only turns a busy port into an early, readable error.

use tokio::net::TcpListener;
use tracing::{debug, error, warn};

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};

/// Reject port 0 and warn on privileged ports
pub fn validate_port_range(port: u16) -> Result<()> {
    if port == 0 {
        return Err(ServerError::ConfigError(
            "Port cannot be 0 for a configured listener".to_string(),
        ));
    }
    if port < 1024 {
        warn!(port, "Privileged port; binding may require elevated permissions");
    }
    Ok(())
}

/// Check that the configured HTTP port can be bound right now
pub async fn validate_port_available(config: &ServerConfig) -> Result<()> {
    validate_port_range(config.http_port)?;
    check_bind(&config.host, config.http_port, "HTTP").await
}

/// Check any extra listener (e.g. the metrics exporter)
pub async fn check_bind(host: &str, port: u16, purpose: &str) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    match TcpListener::bind(&addr).await {
        Ok(listener) => {
            drop(listener);
            debug!(purpose, port, "Port is available");
            Ok(())
        }
        Err(e) => {
            error!(purpose, port, error = %e, "Port is not available");
            Err(ServerError::port_in_use(port, e.to_string()))
        }
    }
}

/// True if binding `host:port` fails right now
pub async fn is_port_in_use(host: &str, port: u16) -> bool {
    TcpListener::bind(format!("{}:{}", host, port)).await.is_err()
}
