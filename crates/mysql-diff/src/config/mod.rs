//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::Result;
use std::path::Path;

impl Config {
    /// Assemble and validate a configuration.
    pub fn new(
        url1: ConnectionConfig,
        url2: ConnectionConfig,
        selection: DatabaseSelection,
        diff: DiffConfig,
    ) -> Result<Self> {
        let config = Self {
            url1,
            url2,
            selection,
            diff,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

impl DiffConfig {
    /// Load tuning from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse tuning from a YAML string. Missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: DiffConfig = serde_yaml::from_str(yaml)?;
        validation::validate_diff(&config)?;
        Ok(config)
    }
}
