//! Observability for Stockroom
//!
//! - Structured logging via `tracing`
//! - Prometheus metrics exporter
//! - HTTP request metrics
//!
//! ```ignore
//! use observability::{init_logging, LogFormat};
//!
//! init_logging("stockroom", LogFormat::Pretty)?;
//! observability::init_metrics(9090)?;
//! ```

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LogFormat};
pub use metrics::{init_metrics, HttpMetrics, RequestTimer};
