//! Server infrastructure for Stockroom
//!
//! An Axum HTTP server with a shared middleware stack, graceful shutdown via
//! `CancellationToken`, health routes and start-up port checks.
//!
//! ```ignore
//! use server::{HttpServer, ServerConfig, ServerExt, ShutdownController};
//!
//! let shutdown = ShutdownController::with_signals();
//! HttpServer::new(ServerConfig::new("0.0.0.0", 8080), router)
//!     .run_until(shutdown.clone())
//!     .await?;
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod http;
pub mod port_validator;
pub mod shutdown;
pub mod traits;

pub use config::{ports, ServerConfig};
pub use error::{Result, ServerError};
pub use health::{health_routes, ComponentStatus, HealthState};
pub use http::HttpServer;
pub use port_validator::{check_bind, validate_port_available};
pub use shutdown::ShutdownController;
pub use traits::{Server, ServerExt};
