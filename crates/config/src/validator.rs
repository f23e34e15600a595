use crate::*;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Service name is required")]
    MissingServiceName,

    #[error("{field} must be a valid port (1-65535)")]
    InvalidPort { field: String },

    #[error("Invalid storage type '{0}'. Must be one of: memory, postgres")]
    InvalidStorageType(String),

    #[error("Storage type is 'postgres' but postgres configuration is missing")]
    MissingPostgresConfig,

    #[error("Storage: {message}")]
    InvalidStorage { message: String },

    #[error("{field} must be a positive integer")]
    InvalidPositiveInteger { field: String },

    #[error("Invalid log format '{0}'. Must be one of: pretty, json, compact")]
    InvalidLogFormat(String),

    #[error("Seed inventory for '{product_id}' has negative total_stock {total_stock}")]
    NegativeSeedStock { product_id: String, total_stock: i32 },

    #[error("Seed inventory contains product '{0}' more than once")]
    DuplicateSeedProduct(String),

    #[error("Seed inventory entry has a blank product_id")]
    BlankSeedProduct,

    #[error("Seed users contain id {0} more than once")]
    DuplicateSeedUser(i64),

    #[error("{field} contains an unresolved environment variable: {value}")]
    UnresolvedEnvVar { field: String, value: String },
}

#[derive(Debug, Clone)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct DefaultApplied {
    pub field: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
    pub defaults_applied: Vec<DefaultApplied>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
            defaults_applied: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, field: &str, message: &str) {
        self.warnings.push(ValidationWarning {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_default(&mut self, field: &str, value: &str) {
        self.defaults_applied.push(DefaultApplied {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

pub fn validate_config(config: &MasterConfig) -> ValidationReport {
    let mut report = ValidationReport::new();

    validate_service(&config.service, &mut report);
    validate_storage(&config.storage, &mut report);

    match &config.reservation {
        Some(reservation) => validate_reservation(reservation, &mut report),
        None => {
            report.add_default("reservation.worker_pool_size", &default_worker_pool_size().to_string());
            report.add_default("reservation.queue_capacity", &default_queue_capacity().to_string());
        }
    }

    match &config.logging {
        Some(logging) => validate_logging(logging, &mut report),
        None => report.add_default("logging.format", &default_log_format()),
    }

    match &config.metrics {
        Some(metrics) => validate_metrics(metrics, &config.service, &mut report),
        None => report.add_default("metrics.enabled", "false"),
    }

    if let Some(seed) = &config.seed {
        validate_seed(seed, &config.storage, &mut report);
    }

    report
}

fn validate_service(service: &ServiceConfig, report: &mut ValidationReport) {
    if service.name.trim().is_empty() {
        report.add_error(ValidationError::MissingServiceName);
    }
    check_env_resolved("service.name", &service.name, report);
    check_env_resolved("service.host", &service.host, report);

    if service.http_port == 0 {
        report.add_error(ValidationError::InvalidPort {
            field: "service.http_port".to_string(),
        });
    }

    if service.request_timeout_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "service.request_timeout_seconds".to_string(),
        });
    }
}

fn validate_storage(storage: &StorageConfig, report: &mut ValidationReport) {
    match storage.storage_type.as_str() {
        "memory" => {
            if storage.postgres.is_some() {
                report.add_warning(
                    "storage.postgres",
                    "postgres settings are ignored when storage type is 'memory'",
                );
            }
        }
        "postgres" => match &storage.postgres {
            Some(pg) => validate_postgres_config(pg, report),
            None => report.add_error(ValidationError::MissingPostgresConfig),
        },
        other => report.add_error(ValidationError::InvalidStorageType(other.to_string())),
    }
}

fn validate_postgres_config(pg: &PostgresConfig, report: &mut ValidationReport) {
    for (field, value) in [
        ("storage.postgres.host", &pg.host),
        ("storage.postgres.database", &pg.database),
        ("storage.postgres.user", &pg.user),
    ] {
        if value.trim().is_empty() {
            report.add_error(ValidationError::InvalidStorage {
                message: format!("{} is required", field),
            });
        }
        check_env_resolved(field, value, report);
    }
    check_env_resolved("storage.postgres.password", &pg.password, report);

    if pg.port == 0 {
        report.add_error(ValidationError::InvalidPort {
            field: "storage.postgres.port".to_string(),
        });
    }

    if pg.max_connections == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "storage.postgres.max_connections".to_string(),
        });
    }

    if pg.connection_timeout_seconds == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "storage.postgres.connection_timeout_seconds".to_string(),
        });
    }

    let valid_ssl_modes = ["disable", "allow", "prefer", "require", "verify-ca", "verify-full"];
    if !valid_ssl_modes.contains(&pg.ssl_mode.as_str()) {
        report.add_warning(
            "storage.postgres.ssl_mode",
            &format!("Unknown ssl_mode '{}'; the driver may reject it", pg.ssl_mode),
        );
    }
}

fn validate_reservation(reservation: &ReservationConfig, report: &mut ValidationReport) {
    if reservation.worker_pool_size == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "reservation.worker_pool_size".to_string(),
        });
    }

    if reservation.queue_capacity == 0 {
        report.add_error(ValidationError::InvalidPositiveInteger {
            field: "reservation.queue_capacity".to_string(),
        });
    }

    if reservation.queue_capacity > 0 && reservation.queue_capacity < reservation.worker_pool_size {
        report.add_warning(
            "reservation.queue_capacity",
            "queue_capacity is smaller than worker_pool_size; submitters will wait often",
        );
    }
}

fn validate_logging(logging: &LoggingConfig, report: &mut ValidationReport) {
    if !["pretty", "json", "compact"].contains(&logging.format.to_lowercase().as_str()) {
        report.add_error(ValidationError::InvalidLogFormat(logging.format.clone()));
    }
}

fn validate_metrics(metrics: &MetricsConfig, service: &ServiceConfig, report: &mut ValidationReport) {
    if !metrics.enabled {
        return;
    }

    if metrics.port == 0 {
        report.add_error(ValidationError::InvalidPort {
            field: "metrics.port".to_string(),
        });
    } else if metrics.port == service.http_port {
        report.add_error(ValidationError::InvalidPort {
            field: "metrics.port (same as service.http_port)".to_string(),
        });
    }
}

fn validate_seed(seed: &SeedConfig, storage: &StorageConfig, report: &mut ValidationReport) {
    if storage.is_postgres() && (!seed.users.is_empty() || !seed.inventory.is_empty()) {
        report.add_warning(
            "seed",
            "seed data is only loaded into the memory store and will be ignored",
        );
    }

    let mut products = HashSet::new();
    for item in &seed.inventory {
        if item.product_id.trim().is_empty() {
            report.add_error(ValidationError::BlankSeedProduct);
            continue;
        }
        if item.total_stock < 0 {
            report.add_error(ValidationError::NegativeSeedStock {
                product_id: item.product_id.clone(),
                total_stock: item.total_stock,
            });
        }
        if !products.insert(item.product_id.as_str()) {
            report.add_error(ValidationError::DuplicateSeedProduct(item.product_id.clone()));
        }
    }

    let mut users = HashSet::new();
    for user in &seed.users {
        if !users.insert(user.id) {
            report.add_error(ValidationError::DuplicateSeedUser(user.id));
        }
    }
}

fn check_env_resolved(field: &str, value: &str, report: &mut ValidationReport) {
    if substitution::has_unresolved_env_vars(value) {
        report.add_error(ValidationError::UnresolvedEnvVar {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> MasterConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_minimal_config_reports_defaults() {
        let report = validate_config(&parse("service:\n  name: stockroom\n"));

        assert!(report.is_valid());
        let fields: Vec<_> = report.defaults_applied.iter().map(|d| d.field.as_str()).collect();
        assert!(fields.contains(&"reservation.worker_pool_size"));
        assert!(fields.contains(&"logging.format"));
        assert!(fields.contains(&"metrics.enabled"));
    }

    #[test]
    fn test_service_errors() {
        let report = validate_config(&parse("service:\n  name: ' '\n  http_port: 0\n"));

        assert!(report.errors.contains(&ValidationError::MissingServiceName));
        assert!(report.errors.contains(&ValidationError::InvalidPort {
            field: "service.http_port".to_string()
        }));
    }

    #[test]
    fn test_storage_errors() {
        let unknown = validate_config(&parse("service:\n  name: s\nstorage:\n  type: redis\n"));
        assert_eq!(
            unknown.errors,
            vec![ValidationError::InvalidStorageType("redis".to_string())]
        );

        let missing = validate_config(&parse("service:\n  name: s\nstorage:\n  type: postgres\n"));
        assert_eq!(missing.errors, vec![ValidationError::MissingPostgresConfig]);
    }

    #[test]
    fn test_unresolved_password_is_error() {
        let report = validate_config(&parse(
            r#"
service:
  name: s
storage:
  type: postgres
  postgres:
    host: localhost
    database: stockroom
    user: app
    password: ${STOCKROOM_TEST_UNSET_PASSWORD}
"#,
        ));

        assert_eq!(report.errors.len(), 1);
        assert!(matches!(
            &report.errors[0],
            ValidationError::UnresolvedEnvVar { field, .. } if field == "storage.postgres.password"
        ));
    }

    #[test]
    fn test_zero_pool_and_queue_rejected() {
        let report = validate_config(&parse(
            "service:\n  name: s\nreservation:\n  worker_pool_size: 0\n  queue_capacity: 0\n",
        ));
        assert_eq!(report.errors.len(), 2);
    }

    #[test]
    fn test_bad_log_format_rejected() {
        let report = validate_config(&parse("service:\n  name: s\nlogging:\n  format: xml\n"));
        assert_eq!(
            report.errors,
            vec![ValidationError::InvalidLogFormat("xml".to_string())]
        );
    }

    #[test]
    fn test_metrics_port_clash() {
        let report = validate_config(&parse(
            "service:\n  name: s\n  http_port: 9090\nmetrics:\n  enabled: true\n  port: 9090\n",
        ));
        assert!(!report.is_valid());
    }

    #[test]
    fn test_seed_errors() {
        let report = validate_config(&parse(
            r#"
service:
  name: s
seed:
  users:
    - { id: 1, email: a@example.com, display_name: A }
    - { id: 1, email: b@example.com, display_name: B }
  inventory:
    - { product_id: SKU-1, total_stock: -1 }
    - { product_id: SKU-1, total_stock: 3 }
    - { product_id: "", total_stock: 3 }
"#,
        ));

        assert!(report.errors.contains(&ValidationError::NegativeSeedStock {
            product_id: "SKU-1".to_string(),
            total_stock: -1
        }));
        assert!(report
            .errors
            .contains(&ValidationError::DuplicateSeedProduct("SKU-1".to_string())));
        assert!(report.errors.contains(&ValidationError::BlankSeedProduct));
        assert!(report.errors.contains(&ValidationError::DuplicateSeedUser(1)));
    }

    #[test]
    fn test_seed_with_postgres_warns() {
        let report = validate_config(&parse(
            r#"
service:
  name: s
storage:
  type: postgres
  postgres: { host: localhost, database: stockroom, user: app, password: pw }
seed:
  inventory:
    - { product_id: SKU-1, total_stock: 3 }
"#,
        ));

        assert!(report.is_valid());
        assert!(report.warnings.iter().any(|w| w.field == "seed"));
    }
}
