//! Connector configuration.
//!
//! Loaded from a JSON file and overridden by environment variables:
//! - `P8_SQLITE_PATH`: database file
//! - `P8_SQLITE_BATCH_SIZE`: rows fetched per driver round-trip

use crate::types::{DatabaseError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Rows fetched per batch: 100k rows at ~1KB each keeps a batch near 100MB.
pub const DEFAULT_BATCH_SIZE: usize = 100_000;

/// How long a connection waits on a locked database.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema name that denotes SQLite's primary database.
pub const DEFAULT_SCHEMA: &str = "public";

/// Schema names SQLite reserves for itself.
const RESERVED_SCHEMAS: [&str; 3] = ["main", "temp", DEFAULT_SCHEMA];

/// SQLite connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SqliteConfig {
    /// Path to the database file.
    pub path: PathBuf,

    /// Extra databases attached on every connect, keyed by schema name.
    #[serde(default)]
    pub attached: BTreeMap<String, PathBuf>,

    /// Rows fetched per driver round-trip while spooling.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Directory for spool files (system temp dir when unset).
    #[serde(default)]
    pub spool_dir: Option<PathBuf>,

    /// Busy timeout applied on connect.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

impl SqliteConfig {
    /// Configuration for a database file with defaults for everything else.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            attached: BTreeMap::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            spool_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    /// Set the spool batch size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Attach another database file under `schema`.
    pub fn attach(mut self, schema: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.attached.insert(schema.into(), path.into());
        self
    }

    /// Set the spool directory.
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    /// Load configuration from a JSON file, then apply env overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: SqliteConfig = serde_json::from_str(&content).map_err(|e| {
            DatabaseError::ConfigError(format!("Invalid config {}: {}", path.display(), e))
        })?;
        config.with_env_overrides()
    }

    /// Apply `P8_SQLITE_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(path) = std::env::var("P8_SQLITE_PATH") {
            self.path = PathBuf::from(path);
        }
        if let Ok(size) = std::env::var("P8_SQLITE_BATCH_SIZE") {
            self.batch_size = size.parse().map_err(|_| {
                DatabaseError::ConfigError(format!("P8_SQLITE_BATCH_SIZE is not a number: {}", size))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check invariants the connector relies on.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(DatabaseError::ConfigError(
                "batch_size must be at least 1".to_string(),
            ));
        }
        for schema in self.attached.keys() {
            if RESERVED_SCHEMAS.contains(&schema.to_lowercase().as_str()) {
                return Err(DatabaseError::ConfigError(format!(
                    "Cannot attach a database as reserved schema '{}'",
                    schema
                )));
            }
            if schema.is_empty() || schema.contains('.') {
                return Err(DatabaseError::ConfigError(format!(
                    "Invalid schema name for attached database: '{}'",
                    schema
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_from_minimal_json() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("sqlite.json");
        fs::write(&file, r#"{"path": "/tmp/test.db"}"#).unwrap();

        let config: SqliteConfig =
            serde_json::from_str(&fs::read_to_string(&file).unwrap()).unwrap();
        assert_eq!(config.path, PathBuf::from("/tmp/test.db"));
        assert_eq!(config.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert!(config.attached.is_empty());
    }

    #[test]
    fn test_validate_rejects_zero_batch() {
        let config = SqliteConfig::new("x.db").with_batch_size(0);
        assert!(matches!(config.validate(), Err(DatabaseError::ConfigError(_))));
    }

    #[test]
    fn test_validate_rejects_reserved_schema() {
        let config = SqliteConfig::new("x.db").attach("main", "other.db");
        assert!(config.validate().is_err());

        let config = SqliteConfig::new("x.db").attach("Public", "other.db");
        assert!(config.validate().is_err());

        let config = SqliteConfig::new("x.db").attach("other", "other.db");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("broken.json");
        fs::write(&file, "{not json").unwrap();

        assert!(matches!(
            SqliteConfig::load(&file),
            Err(DatabaseError::ConfigError(_))
        ));
    }
}
