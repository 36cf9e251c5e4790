//! Cluster configuration: TOML loading, shared settings and the
//! aggregate [`AeroConfig`].
//!
//! Every AERO binary reads one TOML file. Sections map onto the
//! per-subsystem config structs; missing sections fall back to defaults.
//!
//! # Usage
//!
//! ```rust,no_run
//! use aero_common::config::{AeroConfig, ConfigError};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = AeroConfig::load_validated(Path::new("config/aero.toml"))?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use crate::bios::BiosConfig;
use crate::rotor::RotorConfig;
use crate::vrs::VrsConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Why a configuration file could not be used.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("config file not found")]
    FileNotFound,

    /// Unreadable file or malformed TOML.
    #[error("config parse error: {0}")]
    ParseError(String),

    /// Parsed, but a value is out of range.
    #[error("invalid config: {0}")]
    ValidationError(String),
}

/// `[shared].log_level`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// `[shared]` section.
///
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "aero-sim-01"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    #[serde(default)]
    pub log_level: LogLevel,

    /// Instance name, reported in logs and the final report.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            service_name: "aero".to_string(),
        }
    }
}

impl SharedConfig {
    /// Rejects an empty `service_name`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// TOML loading for any deserializable config type.
///
/// A missing file is [`ConfigError::FileNotFound`]; any other I/O failure or
/// a syntax error is [`ConfigError::ParseError`].
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Read and parse `path`.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        Self::from_toml(&content)
    }

    /// Parse TOML already in memory.
    fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

// ─── Aggregate configuration ────────────────────────────────────────

/// Complete configuration for the control cluster.
///
/// ```toml
/// [shared]
/// service_name = "aero"
///
/// [vrs]
/// aggression = 0.6
///
/// [rotor]
/// num_blades = 4
///
/// [bios]
/// healing_strategy = "memory_copy"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AeroConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub vrs: VrsConfig,
    #[serde(default)]
    pub rotor: RotorConfig,
    #[serde(default)]
    pub bios: BiosConfig,
}

impl AeroConfig {
    /// Validate every section, prefixing errors with the section name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        self.vrs
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("[vrs] {e}")))?;
        self.rotor
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("[rotor] {e}")))?;
        self.bios
            .validate()
            .map_err(|e| ConfigError::ValidationError(format!("[bios] {e}")))?;
        Ok(())
    }

    /// Load and validate in one step.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}
