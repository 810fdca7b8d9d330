//! SQLite connector (main API).
//!
//! Ties the pieces together: queries run through the spooler and come back
//! as [`Table`]s, copies go through the provisioner, and existence checks
//! use the catalog probe. Every call that opens its own connection runs in
//! a transaction scope.

use crate::catalog::{qualified_table_exists, table_exists, QualifiedName};
use crate::config::SqliteConfig;
use crate::driver::{Connection, Driver, SqliteDriver};
use crate::provision::{copy_with_policy, provision_then_copy, CopyOutcome, IfExists};
use crate::scope::{with_cursor, with_transaction};
use crate::spool::{SpooledArtifact, Spooler};
use crate::table::Table;
use crate::types::{DatabaseError, Params, Result, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Handle to one SQLite database plus its attached schemas.
#[derive(Clone)]
pub struct Sqlite {
    driver: Arc<dyn Driver>,
    spooler: Spooler,
}

impl Sqlite {
    /// Open a connector from configuration.
    ///
    /// No connection is made until the first call.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ConfigError` if the configuration is invalid
    pub fn new(config: SqliteConfig) -> Result<Self> {
        config.validate()?;
        let spooler = Spooler::from_config(&config)?;
        info!(path = %config.path.display(), batch_size = config.batch_size, "SQLite connector ready");
        Ok(Self {
            driver: Arc::new(SqliteDriver::new(config)),
            spooler,
        })
    }

    /// Open a connector for a database file with default settings.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(SqliteConfig::new(path.as_ref()))
    }

    /// Build a connector over any driver.
    pub fn with_driver(driver: Arc<dyn Driver>, spooler: Spooler) -> Self {
        Self { driver, spooler }
    }

    pub fn driver(&self) -> &dyn Driver {
        self.driver.as_ref()
    }

    pub fn spooler(&self) -> &Spooler {
        &self.spooler
    }

    /// Run `f` in a transaction on a fresh connection.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn Connection) -> Result<T>,
    {
        with_transaction(self.driver(), f)
    }

    /// Run `sql` in its own transaction and return its rows.
    ///
    /// # Returns
    ///
    /// `None` when the statement has no result set (DDL, `INSERT`, ...).
    /// A query matching zero rows returns an empty table that still carries
    /// its columns.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let db = Sqlite::open("app.db")?;
    /// let table = db.query("SELECT * FROM users WHERE id = :id", &Params::named([("id", 1)]))?;
    /// ```
    pub fn query(&self, sql: &str, params: &Params) -> Result<Option<Table>> {
        self.transaction(|conn| self.query_with_connection(sql, conn, params, false))
    }

    /// Run `sql` on a caller-owned connection.
    ///
    /// The connection is left open. With `commit` set, the transaction is
    /// committed right after execution.
    pub fn query_with_connection(
        &self,
        sql: &str,
        conn: &dyn Connection,
        params: &Params,
        commit: bool,
    ) -> Result<Option<Table>> {
        let artifact = self.spooler.execute_and_spool(sql, conn, params, commit)?;
        if artifact.columns().is_empty() {
            return Ok(None);
        }
        Table::materialize(artifact).map(Some)
    }

    /// Run `sql` on `conn` and keep the spooled rows on disk.
    pub fn execute_and_spool(
        &self,
        sql: &str,
        conn: &dyn Connection,
        params: &Params,
        commit: bool,
    ) -> Result<SpooledArtifact> {
        self.spooler.execute_and_spool(sql, conn, params, commit)
    }

    /// Run a statement for its side effects in its own transaction.
    pub fn execute(&self, sql: &str, params: &Params) -> Result<()> {
        self.transaction(|conn| {
            with_cursor(conn, |cursor| {
                cursor.execute(sql, params)?;
                Ok(())
            })
        })
    }

    /// Copy `table` into `table_name` under an `if_exists` policy.
    ///
    /// See [`provision_then_copy`] for the policy semantics.
    pub fn copy(
        &self,
        table: &Table,
        table_name: &str,
        if_exists: &str,
        strict_length: bool,
    ) -> Result<CopyOutcome> {
        provision_then_copy(self.driver(), table, table_name, if_exists, strict_length)
    }

    /// [`Sqlite::copy`] with a typed policy.
    pub fn copy_with(
        &self,
        table: &Table,
        table_name: &str,
        if_exists: IfExists,
        strict_length: bool,
    ) -> Result<CopyOutcome> {
        copy_with_policy(self.driver(), table, table_name, if_exists, strict_length)
    }

    /// Check whether `name` exists as a table, or also as a view.
    pub fn table_exists(&self, name: &str, check_views: bool) -> Result<bool> {
        self.transaction(|conn| table_exists(conn, name, check_views))
    }

    /// Handle for working with one existing table.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::InvalidName` for a malformed name
    pub fn table(&self, name: &str) -> Result<TableHandle<'_>> {
        Ok(TableHandle {
            db: self,
            name: QualifiedName::parse(name)?,
        })
    }
}

/// Convenience operations on a single table.
pub struct TableHandle<'a> {
    db: &'a Sqlite,
    name: QualifiedName,
}

impl<'a> TableHandle<'a> {
    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn exists(&self) -> Result<bool> {
        self.db
            .transaction(|conn| qualified_table_exists(conn, &self.name, false))
    }

    /// Number of rows in the table.
    pub fn num_rows(&self) -> Result<i64> {
        let sql = format!("SELECT count(*) AS n FROM {}", self.name.to_sql());
        let table = self.select(&sql, &Params::None)?;
        match table.first() {
            Some(Value::Integer(n)) => Ok(*n),
            other => Err(DatabaseError::validation(format!(
                "Expected an integer row count for {}, got {}",
                self.name,
                other.map_or("nothing", Value::type_name)
            ))),
        }
    }

    /// Column names in table order.
    pub fn columns(&self) -> Result<Vec<String>> {
        let sql = format!("SELECT * FROM {} LIMIT 0", self.name.to_sql());
        Ok(self.select(&sql, &Params::None)?.columns().to_vec())
    }

    /// Read a page of rows in `rowid` order.
    ///
    /// # Arguments
    ///
    /// * `offset` - Rows to skip
    /// * `limit` - Maximum rows to return
    pub fn get_rows(&self, offset: usize, limit: usize) -> Result<Table> {
        let sql = format!(
            "SELECT * FROM {} ORDER BY rowid LIMIT :limit OFFSET :offset",
            self.name.to_sql()
        );
        let params = Params::named([("limit", limit as i64), ("offset", offset as i64)]);
        self.select(&sql, &params)
    }

    /// Delete every row, keeping the table definition.
    pub fn truncate(&self) -> Result<()> {
        info!(table = %self.name, "Truncating table");
        self.db
            .execute(&format!("DELETE FROM {}", self.name.to_sql()), &Params::None)
    }

    /// Drop the table.
    pub fn drop(&self) -> Result<()> {
        info!(table = %self.name, "Dropping table");
        self.db
            .execute(&format!("DROP TABLE {}", self.name.to_sql()), &Params::None)
    }

    fn select(&self, sql: &str, params: &Params) -> Result<Table> {
        self.db.query(sql, params)?.ok_or_else(|| {
            DatabaseError::validation(format!("Statement returned no result set: {}", sql))
        })
    }
}
