//! Batched result spooling.
//!
//! Drains a statement's result set through a cursor in fixed-size batches
//! into a type-preserving temporary file, so peak memory is bounded by the
//! batch size rather than the result size.
//!
//! # Example
//!
//! ```rust,ignore
//! let spooler = Spooler::new(10_000)?;
//! let artifact = spooler.execute_and_spool("SELECT * FROM users", conn, &Params::None, false)?;
//! let table = Table::materialize(artifact)?;
//! ```

pub mod artifact;
pub mod format;

pub use artifact::{SpoolReader, SpoolStats, SpoolWriter, SpooledArtifact};

use crate::config::{SqliteConfig, DEFAULT_BATCH_SIZE};
use crate::driver::Connection;
use crate::otel::{db_query_span, record_db_metrics};
use crate::scope::with_cursor;
use crate::types::{DatabaseError, Params, Result};
use std::path::PathBuf;
use tracing::debug;

/// Executes statements and spools their rows to disk.
#[derive(Debug, Clone)]
pub struct Spooler {
    batch_size: usize,
    spool_dir: Option<PathBuf>,
}

impl Default for Spooler {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            spool_dir: None,
        }
    }
}

impl Spooler {
    /// Create a spooler fetching `batch_size` rows per round-trip.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ValidationError` if `batch_size` is zero
    pub fn new(batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(DatabaseError::validation("batch size must be at least 1"));
        }
        Ok(Self {
            batch_size,
            spool_dir: None,
        })
    }

    /// Spooler using the batch size and spool directory from `config`.
    pub fn from_config(config: &SqliteConfig) -> Result<Self> {
        let mut spooler = Self::new(config.batch_size)?;
        spooler.spool_dir = config.spool_dir.clone();
        Ok(spooler)
    }

    /// Write spool files under `dir` instead of the system temp dir.
    pub fn with_spool_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spool_dir = Some(dir.into());
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Execute `sql` on `conn` and spool its result set.
    ///
    /// # Arguments
    ///
    /// * `sql` - A single statement
    /// * `conn` - Open connection; not closed or committed here unless `commit`
    /// * `params` - Values for the statement's placeholders
    /// * `commit` - Commit right after execution instead of leaving it to the
    ///   enclosing transaction scope
    ///
    /// # Returns
    ///
    /// Artifact holding the header and every row. Statements without a
    /// result set produce an artifact with an empty header and no rows.
    ///
    /// # Errors
    ///
    /// Driver errors from execute or fetch are returned unchanged.
    pub fn execute_and_spool(
        &self,
        sql: &str,
        conn: &dyn Connection,
        params: &Params,
        commit: bool,
    ) -> Result<SpooledArtifact> {
        let span = db_query_span(sql, None);
        let _guard = span.enter();

        with_cursor(conn, |cursor| {
            debug!(sql, "SQL Query");
            let mut result = cursor.execute(sql, params)?;

            if commit {
                conn.commit()?;
            }

            let mut writer = SpoolWriter::create(self.spool_dir.as_deref(), result.description())?;
            if result.description().is_empty() {
                return writer.finish();
            }

            loop {
                let batch = result.fetch_many(self.batch_size)?;
                if batch.is_empty() {
                    break;
                }
                debug!(rows = batch.len(), "Fetched rows");
                writer.append_batch(&batch)?;
            }

            let artifact = writer.finish()?;
            record_db_metrics(Some(artifact.stats().rows as usize), None);
            Ok(artifact)
        })
    }
}
