//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Location
//!
//! Searched in order (first found wins):
//! 1. `$REGISTRAR_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/registrar/config.toml`
//! 3. `~/.registrar/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing to ensure they conform to
//! expected formats (e.g., passing grades must be real grade tokens).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::policy::PrerequisiteMode;
use crate::core::types::Grade;

/// Registrar configuration.
///
/// # Example
///
/// ```toml
/// state_file = "/var/lib/registrar/state.json"
///
/// [grading]
/// passing = ["A", "B", "C", "D"]
/// prerequisites = "direct"
///
/// [locking]
/// timeout_ms = 2000
///
/// [retry]
/// max_attempts = 3
/// base_delay_ms = 50
/// max_delay_ms = 1000
///
/// [logging]
/// filter = "registrar=info"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrarConfig {
    /// Default state file used by the CLI
    pub state_file: Option<PathBuf>,

    /// Grading policy
    pub grading: Option<GradingConfig>,

    /// Lock acquisition budget
    pub locking: Option<LockingConfig>,

    /// Caller-side retry of transient failures
    pub retry: Option<RetryConfig>,

    /// Log filter
    pub logging: Option<LoggingConfig>,
}

impl RegistrarConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(grading) = &self.grading {
            grading.validate()?;
        }
        if let Some(locking) = &self.locking {
            locking.validate()?;
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        Ok(())
    }
}

/// Grading policy settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GradingConfig {
    /// Grades that satisfy prerequisites and earn credit
    pub passing: Option<Vec<String>>,

    /// "direct" or "transitive"
    pub prerequisites: Option<PrerequisiteMode>,
}

impl GradingConfig {
    /// Parse the configured passing set.
    pub fn passing_grades(&self) -> Result<Option<Vec<Grade>>, ConfigError> {
        let Some(tokens) = &self.passing else {
            return Ok(None);
        };
        let grades = tokens
            .iter()
            .map(|t| {
                t.parse::<Grade>()
                    .map_err(|e| ConfigError::InvalidValue(format!("grading.passing: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(grades))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(grades) = self.passing_grades()? {
            if grades.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "grading.passing cannot be empty".to_string(),
                ));
            }
            if let Some(bad) = grades.iter().find(|g| matches!(g, Grade::W | Grade::I)) {
                return Err(ConfigError::InvalidValue(format!(
                    "grading.passing cannot contain '{bad}'"
                )));
            }
        }
        Ok(())
    }
}

/// Lock settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LockingConfig {
    /// Default time budget for acquiring locks when the request has none
    pub timeout_ms: Option<u64>,
}

impl LockingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms == Some(0) {
            return Err(ConfigError::InvalidValue(
                "locking.timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Retry settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: Option<u32>,

    /// Delay before the first retry
    pub base_delay_ms: Option<u64>,

    /// Upper bound on any single delay
    pub max_delay_ms: Option<u64>,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if let (Some(base), Some(max)) = (self.base_delay_ms, self.max_delay_ms) {
            if base > max {
                return Err(ConfigError::InvalidValue(format!(
                    "retry.base_delay_ms ({base}) exceeds retry.max_delay_ms ({max})"
                )));
            }
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive
    pub filter: Option<String>,
}
