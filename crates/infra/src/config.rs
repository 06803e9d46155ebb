//! Configuration loader
//!
//! Loads engine configuration from environment variables with a TOML-file
//! fallback.
//!
//! ## Environment Variables
//! - `CREWPLAN_DB_PATH`: Database file path
//! - `CREWPLAN_DB_POOL_SIZE`: Connection pool size

use std::path::Path;

use crewplan_domain::{Result, ScheduleError};
use serde::{Deserialize, Serialize};

/// Database section of the engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub database: DatabaseConfig,
}

fn default_pool_size() -> u32 {
    4
}

/// Load configuration, preferring environment variables and falling back to
/// the given TOML file.
pub fn load(fallback_path: &Path) -> Result<EngineConfig> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "environment incomplete, trying config file");
            load_from_file(fallback_path)
        }
    }
}

/// Load configuration from environment variables. All required variables
/// must be present.
pub fn load_from_env() -> Result<EngineConfig> {
    let path = std::env::var("CREWPLAN_DB_PATH").map_err(|_| {
        ScheduleError::Validation("CREWPLAN_DB_PATH is not set".into())
    })?;
    let pool_size = match std::env::var("CREWPLAN_DB_POOL_SIZE") {
        Ok(raw) => raw.parse::<u32>().map_err(|e| {
            ScheduleError::Validation(format!("invalid CREWPLAN_DB_POOL_SIZE: {e}"))
        })?,
        Err(_) => default_pool_size(),
    };

    Ok(EngineConfig {
        database: DatabaseConfig { path, pool_size },
    })
}

/// Load configuration from a TOML file.
pub fn load_from_file(path: &Path) -> Result<EngineConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        ScheduleError::Validation(format!(
            "cannot read config file {}: {e}",
            path.display()
        ))
    })?;
    toml::from_str(&raw).map_err(|e| {
        ScheduleError::Validation(format!("invalid config file {}: {e}", path.display()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_config_parses_with_defaulted_pool_size() {
        let config: EngineConfig = toml::from_str(
            r#"
            [database]
            path = "/var/lib/crewplan/engine.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.path, "/var/lib/crewplan/engine.db");
        assert_eq!(config.database.pool_size, 4);
    }

    #[test]
    fn toml_config_honours_explicit_pool_size() {
        let config: EngineConfig = toml::from_str(
            r#"
            [database]
            path = "engine.db"
            pool_size = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.database.pool_size, 16);
    }

    #[test]
    fn missing_config_file_is_a_validation_error() {
        let err = load_from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ScheduleError::Validation(_)));
    }
}
