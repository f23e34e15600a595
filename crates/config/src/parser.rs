use crate::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument};

#[instrument(skip(path))]
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<MasterConfig> {
    let path = path.as_ref();
    info!("Loading configuration from: {:?}", path);

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    debug!("Config file content length: {} bytes", content.len());

    let config = parse_config(&content)?;
    info!("Configuration loaded successfully");
    Ok(config)
}

/// Substitute environment variables, then parse YAML
pub fn parse_config(content: &str) -> Result<MasterConfig> {
    let substituted = substitution::substitute_env_vars(content)?;
    debug!("Environment variable substitution completed");

    serde_yaml::from_str(&substituted).with_context(|| "Failed to parse YAML configuration")
}

#[instrument]
pub fn generate_default_config() -> MasterConfig {
    MasterConfig {
        service: ServiceConfig::default(),
        storage: StorageConfig::default(),
        reservation: Some(ReservationConfig::default()),
        logging: Some(LoggingConfig::default()),
        metrics: Some(MetricsConfig {
            enabled: false,
            port: default_metrics_port(),
        }),
        seed: Some(SeedConfig {
            users: vec![SeedUser {
                id: 1,
                email: "alice@example.com".to_string(),
                display_name: "Alice".to_string(),
            }],
            inventory: vec![
                SeedInventory {
                    product_id: "SKU-BOOK-123".to_string(),
                    total_stock: 10,
                },
                SeedInventory {
                    product_id: "SKU-MUG-456".to_string(),
                    total_stock: 5,
                },
            ],
        }),
    }
}

#[instrument]
pub fn save_config<P: AsRef<Path> + std::fmt::Debug>(config: &MasterConfig, path: P) -> Result<()> {
    let path = path.as_ref();
    info!("Saving configuration to: {:?}", path);

    let yaml = serde_yaml::to_string(config)
        .with_context(|| "Failed to serialize configuration to YAML")?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    fs::write(path, yaml)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;

    info!("Configuration saved successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("stockroom-config-{}-{}", std::process::id(), name))
            .join("stockroom.yaml")
    }

    #[test]
    fn test_default_config_round_trips_through_disk() {
        let path = temp_path("roundtrip");
        let config = generate_default_config();

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.service.name, "stockroom");
        assert_eq!(loaded.seed().inventory.len(), 2);
        assert!(validate_config(&loaded).is_valid());

        let _ = fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = load_config(temp_path("absent")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_parse_substitutes_env() {
        std::env::set_var("STOCKROOM_TEST_SERVICE_NAME", "stockroom-east");

        let config = parse_config("service:\n  name: ${STOCKROOM_TEST_SERVICE_NAME}\n").unwrap();
        assert_eq!(config.service.name, "stockroom-east");
    }

    #[test]
    fn test_parse_rejects_bad_yaml() {
        assert!(parse_config("service: [unterminated").is_err());
    }
}
