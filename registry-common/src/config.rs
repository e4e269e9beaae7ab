//! Configuration loading
//!
//! Bootstrap configuration comes from a TOML file. Values are resolved in
//! priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the database path
pub const DATABASE_ENV_VAR: &str = "REGISTRY_DATABASE";

/// Environment variable forcing `ignore_errors` on
pub const IGNORE_ERRORS_ENV_VAR: &str = "REGISTRY_IGNORE_ERRORS";

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Path to SQLite database file
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Pipeline tuning
    #[serde(default)]
    pub import: ImportSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Settings consumed by the import pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// Number of keys per identity lookup query
    #[serde(default = "default_lookup_chunk_size")]
    pub lookup_chunk_size: usize,

    /// Rows per bulk insert/update batch
    #[serde(default = "default_write_batch_size")]
    pub write_batch_size: usize,

    /// Minimum chord distance (km on a 6371 km sphere) between two
    /// facilities of the same category
    #[serde(default = "default_min_distance_km")]
    pub min_distance_km: f64,

    /// Persist surviving rows even when errors were reported
    #[serde(default)]
    pub ignore_errors: bool,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            lookup_chunk_size: default_lookup_chunk_size(),
            write_batch_size: default_write_batch_size(),
            min_distance_km: default_min_distance_km(),
            ignore_errors: false,
        }
    }
}

impl ImportSettings {
    /// Reject values that would make the pipeline loop or divide by zero
    pub fn validate(&self) -> Result<()> {
        if self.lookup_chunk_size == 0 {
            return Err(Error::Config("import.lookup_chunk_size must be > 0".to_string()));
        }
        if self.write_batch_size == 0 {
            return Err(Error::Config("import.write_batch_size must be > 0".to_string()));
        }
        if !self.min_distance_km.is_finite() || self.min_distance_km < 0.0 {
            return Err(Error::Config(format!(
                "import.min_distance_km must be a non-negative number, got {}",
                self.min_distance_km
            )));
        }
        Ok(())
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_lookup_chunk_size() -> usize {
    500
}

fn default_write_batch_size() -> usize {
    1000
}

fn default_min_distance_km() -> f64 {
    0.5
}

impl ImportConfig {
    /// Load configuration from an explicit TOML path, or the platform default
    /// location when `path` is None. A missing file yields defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => {
                    warn!("Could not determine config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            warn!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;
        config.import.validate()?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Resolve the database path: CLI → ENV → TOML → compiled default
    pub fn resolve_database_path(&self, cli_arg: Option<&Path>) -> PathBuf {
        if let Some(path) = cli_arg {
            return path.to_path_buf();
        }

        if let Ok(path) = std::env::var(DATABASE_ENV_VAR) {
            if !path.trim().is_empty() {
                return PathBuf::from(path);
            }
        }

        if let Some(path) = &self.database_path {
            return path.clone();
        }

        default_database_path()
    }

    /// Resolve `ignore_errors`: CLI flag → ENV → TOML
    pub fn resolve_ignore_errors(&self, cli_flag: bool) -> bool {
        if cli_flag {
            return true;
        }

        if let Ok(value) = std::env::var(IGNORE_ERRORS_ENV_VAR) {
            return matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes");
        }

        self.import.ignore_errors
    }
}

/// `~/.config/registry/config.toml` (platform equivalent elsewhere)
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("registry").join("config.toml"))
}

/// OS-dependent default database location
fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("registry"))
        .unwrap_or_else(|| PathBuf::from("./registry_data"))
        .join("registry.db")
}
