//! Pipeline-wide configuration.
//!
//! Per-source capacity, refill rate, and staleness caps live on
//! `SourceDescriptor`/`TableDescriptor` (§3) because they vary per source.
//! This module holds the handful of settings that apply to the pipeline as
//! a whole: cache sizing, the default connector deadline, and how many
//! fetches the executor runs concurrently (§5).
//!
//! # Configuration file format
//!
//! ```toml
//! [cache]
//! enabled = true
//! max_entries = 10000
//!
//! [executor]
//! default_deadline_ms = 5000
//! max_concurrent_fetches = 16
//! ```
//!
//! # Environment variable expansion
//!
//! Values may reference `${VAR}` placeholders, expanded against the
//! process environment before TOML parsing — useful for secrets that
//! should not live in a checked-in config file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::CacheConfig;
use crate::error::{FedSqlError, Result};

/// Executor concurrency and deadline defaults (§4.7).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Default per-connector-call deadline, used when a query does not
    /// override it.
    pub default_deadline_ms: u64,
    /// Maximum number of fetch-node calls running concurrently across a
    /// query's fan-out (§5 bounded concurrency).
    pub max_concurrent_fetches: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { default_deadline_ms: 5_000, max_concurrent_fetches: 16 }
    }
}

/// Top-level pipeline configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FedSqlConfig {
    /// Freshness cache sizing (§4.3).
    pub cache: CacheConfig,
    /// Executor concurrency and deadlines (§4.7).
    pub executor: ExecutorConfig,
}

impl FedSqlConfig {
    /// Load configuration from a TOML file on disk.
    ///
    /// # Errors
    ///
    /// Returns `FedSqlError::Internal` if the file cannot be read or the
    /// TOML cannot be parsed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FedSqlError::Internal { message: format!("failed to read config file '{}': {e}", path.display()) })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string, expanding `${VAR}`
    /// environment references first.
    ///
    /// # Errors
    ///
    /// Returns `FedSqlError::Internal` if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| FedSqlError::Internal { message: format!("invalid configuration: {e}") })
    }

    /// Serialize back to a TOML string, for diagnostics and config dumps.
    #[must_use]
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Validate cross-field invariants that `serde`'s field-level
    /// deserialization cannot express.
    ///
    /// # Errors
    ///
    /// Returns `FedSqlError::Internal` if the configuration is internally
    /// inconsistent.
    pub fn validate(&self) -> Result<()> {
        if self.executor.max_concurrent_fetches == 0 {
            return Err(FedSqlError::Internal { message: "executor.max_concurrent_fetches must be > 0".into() });
        }
        if self.cache.max_entries == 0 {
            return Err(FedSqlError::Internal { message: "cache.max_entries must be > 0".into() });
        }
        Ok(())
    }
}

/// Expand `${VAR}` references against the process environment. Unknown
/// variables are left untouched so a missing secret fails TOML parsing
/// with a visible placeholder rather than silently becoming an empty
/// string.
fn expand_env_vars(content: &str) -> String {
    let mut result = String::with_capacity(content.len());
    let mut rest = content;

    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            result.push_str(rest);
            return result;
        };
        let end = start + end;
        let var_name = &rest[start + 2..end];

        result.push_str(&rest[..start]);
        match std::env::var(var_name) {
            Ok(value) => result.push_str(&value),
            Err(_) => result.push_str(&rest[start..=end]),
        }
        rest = &rest[end + 1..];
    }
    result.push_str(rest);
    result
}
