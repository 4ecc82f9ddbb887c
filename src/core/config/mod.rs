//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Config file
//! 3. CLI flags (not handled here)
//!
//! # Config Locations
//!
//! Searched in order:
//! 1. `$REGISTRAR_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/registrar/config.toml`
//! 3. `~/.registrar/config.toml`
//!
//! # Example
//!
//! ```no_run
//! use registrar::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! println!("Lock timeout: {:?}", config.lock_timeout());
//! println!("Retry attempts: {}", config.retry_max_attempts());
//! ```

pub mod schema;

pub use schema::{GradingConfig, LockingConfig, LoggingConfig, RegistrarConfig, RetryConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

use crate::core::policy::{GradingPolicy, PrerequisiteMode};

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Loaded configuration with defaults applied through accessors.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Parsed file contents
    pub file: RegistrarConfig,
    /// Path the file was loaded from, if any
    path: Option<PathBuf>,
}

impl Config {
    /// Default lock budget when a request carries no deadline of its own.
    pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;
    pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
    pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 25;
    pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 1_000;

    /// Load configuration from the standard locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. A missing file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::discover() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;
        let file: RegistrarConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        file.validate()?;
        Ok(Self {
            file,
            path: Some(path.to_path_buf()),
        })
    }

    /// Find the first existing config file.
    fn discover() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("REGISTRAR_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("registrar/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".registrar/config.toml"))
            .filter(|path| path.exists())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Build the grading policy.
    ///
    /// Defaults to passing set A–D with direct prerequisite checking.
    pub fn grading_policy(&self) -> GradingPolicy {
        let grading = self.file.grading.as_ref();
        let mode = grading
            .and_then(|g| g.prerequisites)
            .unwrap_or(PrerequisiteMode::Direct);
        // Validated at load time; a bad token here means defaults were bypassed.
        match grading.and_then(|g| g.passing_grades().ok().flatten()) {
            Some(passing) => GradingPolicy::new(passing, mode),
            None => GradingPolicy::new(GradingPolicy::DEFAULT_PASSING, mode),
        }
    }

    /// Lock acquisition budget.
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(
            self.file
                .locking
                .as_ref()
                .and_then(|l| l.timeout_ms)
                .unwrap_or(Self::DEFAULT_LOCK_TIMEOUT_MS),
        )
    }

    pub fn retry_max_attempts(&self) -> u32 {
        self.file
            .retry
            .as_ref()
            .and_then(|r| r.max_attempts)
            .unwrap_or(Self::DEFAULT_RETRY_ATTEMPTS)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(
            self.file
                .retry
                .as_ref()
                .and_then(|r| r.base_delay_ms)
                .unwrap_or(Self::DEFAULT_RETRY_BASE_DELAY_MS),
        )
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(
            self.file
                .retry
                .as_ref()
                .and_then(|r| r.max_delay_ms)
                .unwrap_or(Self::DEFAULT_RETRY_MAX_DELAY_MS),
        )
    }

    /// Configured log filter, if any.
    pub fn log_filter(&self) -> Option<&str> {
        self.file
            .logging
            .as_ref()
            .and_then(|l| l.filter.as_deref())
    }

    /// Default state file for the CLI.
    pub fn state_file(&self) -> Option<&Path> {
        self.file.state_file.as_deref()
    }

    /// Get the path the config was loaded from.
    pub fn loaded_from(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}
