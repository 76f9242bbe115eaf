//! Configuration parsing and management.

use crate::abi::{GuestLimits, StreamRouting, WASM_PAGE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Bridge configuration matching the pankti.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Guest module artifact
    #[serde(default = "default_module")]
    pub module: PathBuf,

    #[serde(default)]
    pub streams: StreamRouting,

    #[serde(default)]
    pub limits: GuestLimits,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_module() -> PathBuf {
    PathBuf::from("pankti.wasm")
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            module: default_module(),
            streams: StreamRouting::default(),
            limits: GuestLimits::default(),
            config_path: None,
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_memory_bytes < WASM_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "limits.max_memory_bytes",
                reason: format!("must be at least one page ({} bytes)", WASM_PAGE_SIZE),
            });
        }
        if self.limits.fuel_per_run == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "limits.fuel_per_run",
                reason: "must be positive; omit it for no limit".to_string(),
            });
        }
        Ok(())
    }

    /// Get the guest module path, resolved relative to config file
    pub fn module_path(&self) -> PathBuf {
        self.resolve_path(&self.module)
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(parent) = self.config_path.as_deref().and_then(Path::parent) {
            parent.join(path)
        } else {
            path.to_path_buf()
        }
    }
}
