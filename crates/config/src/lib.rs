//! Stockroom configuration
//!
//! One YAML file, environment placeholders (`${VAR}` or `$VAR`) substituted
//! before parsing. Optional sections fall back to defaults; the validator
//! reports which ones did.

use serde::{Deserialize, Serialize};

pub mod defaults;
pub mod parser;
pub mod substitution;
pub mod validator;

pub use defaults::*;
pub use parser::*;
pub use substitution::*;
pub use validator::*;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "config/stockroom.yaml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MasterConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub reservation: Option<ReservationConfig>,
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub seed: Option<SeedConfig>,
}

impl MasterConfig {
    pub fn reservation(&self) -> ReservationConfig {
        self.reservation.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }

    pub fn metrics(&self) -> MetricsConfig {
        self.metrics.clone().unwrap_or_default()
    }

    pub fn seed(&self) -> SeedConfig {
        self.seed.clone().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            host: default_host(),
            http_port: default_http_port(),
            request_timeout_seconds: default_request_timeout_seconds(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(rename = "type")]
    #[serde(default = "default_storage_type")]
    pub storage_type: String,
    #[serde(default)]
    pub postgres: Option<PostgresConfig>,
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl StorageConfig {
    pub fn is_memory(&self) -> bool {
        self.storage_type == "memory"
    }

    pub fn is_postgres(&self) -> bool {
        self.storage_type == "postgres"
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            storage_type: default_storage_type(),
            postgres: None,
            run_migrations: default_run_migrations(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresConfig {
    pub host: String,
    #[serde(default = "default_postgres_port")]
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_ssl_mode")]
    pub ssl_mode: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: u64,
}

impl PostgresConfig {
    /// `postgres://` connection URL
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.user, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }

    /// Connection URL with the password masked, for logs
    pub fn redacted_url(&self) -> String {
        format!(
            "postgres://{}:***@{}:{}/{}?sslmode={}",
            self.user, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReservationConfig {
    #[serde(default = "default_worker_pool_size")]
    pub worker_pool_size: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: default_worker_pool_size(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub inventory: Vec<SeedInventory>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedUser {
    pub id: i64,
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeedInventory {
    pub product_id: String,
    pub total_stock: i32,
}
