//! # Configuration Management for txscope
//!
//! This crate provides the configuration consumed by the transaction scope
//! manager. The only value the core needs is the persistence-unit name; any
//! additional properties are carried through for the persistence provider.
//!
//! ## Quick Start
//!
//! ### Programmatic Configuration
//! ```rust
//! use config::{AppConfig, PersistenceConfig};
//!
//! let config = AppConfig::new(PersistenceConfig::new("orders"));
//! assert_eq!(config.persistence.unit_name.as_deref(), Some("orders"));
//! ```
//!
//! ### TOML File Configuration
//! ```toml
//! [persistence]
//! unit_name = "orders"
//!
//! [persistence.properties]
//! "provider.flush_mode" = "commit"
//! ```
//!
//! Load configuration:
//! ```rust,no_run
//! use config::AppConfig;
//!
//! // Load from txscope.toml (or the path in TXSCOPE_CONFIG)
//! let config = AppConfig::load()?;
//!
//! // Or load from custom path
//! let config = AppConfig::from_file("config/production.toml")?;
//! # Ok::<(), config::ConfigError>(())
//! ```
//!
//! A missing unit name is not a configuration error: it surfaces lazily, on
//! the first attempt to open a transaction.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::{env, path::Path};
use thiserror::Error;

const DEFAULT_CONFIG_PATH: &str = "./txscope.toml";

/// Environment variable naming an alternative config file.
pub const CONFIG_PATH_ENV: &str = "TXSCOPE_CONFIG";

/// Environment variable overriding the configured persistence-unit name.
pub const UNIT_NAME_ENV: &str = "TXSCOPE_PERSISTENCE_UNIT_NAME";

/// Property under which the persistence-unit name is exposed.
pub const PERSISTENCE_UNIT_NAME_PROPERTY: &str = "txscope.persistence.unit.name";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Environment variable error: {0}")]
    Env(#[from] env::VarError),
    #[error("Dotenvy error: {0}")]
    Dotenvy(#[from] dotenvy::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

/// Persistence unit configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Name of the persistence unit the session factory is built for
    #[serde(default)]
    pub unit_name: Option<String>,

    /// Free-form provider properties
    #[serde(default)]
    pub properties: HashMap<String, String>,
}

impl AppConfig {
    pub fn new(persistence: PersistenceConfig) -> Self {
        Self { persistence }
    }

    /// Load configuration from TOML file specified in .env or defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = {
            // A missing .env file is fine, a malformed one is not
            match dotenvy::dotenv() {
                Ok(_) => {}
                Err(e) if e.not_found() => {}
                Err(e) => return Err(e.into()),
            }

            if let Ok(config_path) = env::var(CONFIG_PATH_ENV) {
                Self::from_file(&config_path)
            } else if Path::new(DEFAULT_CONFIG_PATH).exists() {
                Self::from_file(DEFAULT_CONFIG_PATH)
            } else {
                Err(ConfigError::Invalid(format!(
                    "Config path must be specified in .env file as {} or in {} file",
                    CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH
                )))
            }
        }?;

        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `TXSCOPE_PERSISTENCE_UNIT_NAME` if it is set
    pub fn with_env_overrides(self) -> Self {
        self.apply_overrides(|key| env::var(key).ok())
    }

    fn apply_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(unit_name) = lookup(UNIT_NAME_ENV) {
            self.persistence.unit_name = Some(unit_name);
        }
        self
    }

    /// Look up a named property.
    ///
    /// [`PERSISTENCE_UNIT_NAME_PROPERTY`] resolves to the unit name; any other
    /// name is looked up in the free-form properties table.
    pub fn property(&self, name: &str) -> Option<&str> {
        if name == PERSISTENCE_UNIT_NAME_PROPERTY {
            return self.persistence.unit_name.as_deref();
        }
        self.persistence.properties.get(name).map(String::as_str)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<(), ConfigError> {
        if self.persistence.properties.keys().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "Persistence property names cannot be empty".to_string(),
            ));
        }
        if self
            .persistence
            .properties
            .contains_key(PERSISTENCE_UNIT_NAME_PROPERTY)
        {
            return Err(ConfigError::Invalid(format!(
                "'{}' must be set through persistence.unit_name",
                PERSISTENCE_UNIT_NAME_PROPERTY
            )));
        }

        Ok(())
    }
}

impl PersistenceConfig {
    /// Create a persistence configuration for the given unit
    pub fn new(unit_name: impl Into<String>) -> Self {
        Self {
            unit_name: Some(unit_name.into()),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}
