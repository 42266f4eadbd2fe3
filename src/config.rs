//! Planner configuration (§4.5, §10).
//!
//! `PlannerConfig` holds the enumerated policy flags that shape emission:
//! whether online/concurrent rewrites are allowed, whether CREATE
//! statements get `IF NOT EXISTS`, whether every identifier is quoted
//! regardless of necessity, which schema is implicit, and whether
//! non-transactional DDL is permitted at all. Loadable from TOML the same
//! way the teacher's `Config::from_file` works.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Policy flags controlling how the planner emits DDL (§4.5).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Enables concurrent-index + NOT-VALID-then-VALIDATE rewrites (§4.3).
    pub online: bool,

    /// Adds `IF NOT EXISTS` clauses to CREATE operations.
    pub include_if_not_exists: bool,

    /// Quote every identifier regardless of necessity (§4.6).
    pub quote_all: bool,

    /// Schema whose qualifier is dropped when an object's schema matches it.
    pub target_schema: String,

    /// When true, the planner refuses to emit non-transactional DDL
    /// (`CONCURRENTLY`). `online = true` together with `transactional =
    /// true` is rejected as `PolicyConflict` (§7).
    pub transactional: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            online: false,
            include_if_not_exists: false,
            quote_all: false,
            target_schema: "public".to_string(),
            transactional: true,
        }
    }
}

impl PlannerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Mirrors `Config::validate` in the teacher: reject contradictory
    /// policy combinations at load time, not just at plan time. This is
    /// the same check `plan()` performs as `PlanError::PolicyConflict`
    /// (§7) — surfacing it here lets a misconfigured TOML file fail fast,
    /// before two whole IRs have been built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.online && self.transactional {
            return Err(ConfigError::Validation(
                "online = true requires transactional = false: concurrent operations cannot run inside a transaction".to_string(),
            ));
        }
        if self.target_schema.trim().is_empty() {
            return Err(ConfigError::Validation(
                "target_schema must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PlannerConfig::default().validate().is_ok());
    }

    #[test]
    fn online_with_transactional_is_rejected() {
        let config = PlannerConfig {
            online: true,
            transactional: true,
            ..PlannerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn online_without_transactional_is_valid() {
        let config = PlannerConfig {
            online: true,
            transactional: false,
            ..PlannerConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_from_toml() {
        let toml_text = r#"
            online = true
            transactional = false
            target_schema = "app"
        "#;
        let config: PlannerConfig = toml::from_str(toml_text).unwrap();
        assert!(config.online);
        assert!(!config.transactional);
        assert_eq!(config.target_schema, "app");
        assert!(config.validate().is_ok());
    }
}
