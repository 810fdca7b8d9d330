//! Raw database driver boundary.
//!
//! A DB-API shaped set of traits the scopes, spooler and provisioner are
//! written against. [`sqlite::SqliteDriver`] is the production
//! implementation; tests wrap it to count or fail calls.
//!
//! Ownership mirrors the lifecycle rules:
//! - a `Connection` is exclusively owned by one transaction scope
//! - a `Cursor` borrows its connection and cannot outlive it
//! - a `ResultSet` borrows its cursor, so at most one result set per cursor
//!   is live at a time

pub mod sqlite;

use crate::types::{Params, Result, Row, Value};

pub use sqlite::{quote_identifier, SqliteDriver};

/// Opens connections to the backing store.
pub trait Driver: Send + Sync {
    /// Open a fresh connection.
    fn connect(&self) -> Result<Box<dyn Connection>>;

    /// Whether DDL participates in transactions, so a failed load after a
    /// `DROP TABLE` can be rolled back to the original table.
    fn supports_transactional_ddl(&self) -> bool {
        true
    }
}

/// An open connection.
pub trait Connection {
    /// Acquire a cursor bound to this connection.
    fn cursor(&self) -> Result<Box<dyn Cursor + '_>>;

    /// Commit the open transaction, if any.
    fn commit(&self) -> Result<()>;

    /// Roll back the open transaction, if any.
    fn rollback(&self) -> Result<()>;

    /// Close the connection.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A statement executor bound to one connection.
pub trait Cursor {
    /// Execute a single statement.
    ///
    /// Statements that produce no result set return a result set with an
    /// empty description and no rows.
    fn execute<'a>(&'a mut self, sql: &str, params: &Params) -> Result<Box<dyn ResultSet + 'a>>;

    /// Execute one statement once per parameter row.
    ///
    /// # Returns
    ///
    /// Number of rows executed
    fn execute_many<'r>(
        &mut self,
        sql: &str,
        rows: &mut dyn Iterator<Item = &'r [Value]>,
    ) -> Result<usize>;

    /// Close the cursor, releasing any prepared statement.
    fn close(self: Box<Self>) -> Result<()>;
}

/// Rows produced by one executed statement.
pub trait ResultSet {
    /// Ordered column names; empty when the statement has no result set.
    fn description(&self) -> &[String];

    /// Fetch up to `size` rows. An empty batch means the set is exhausted.
    fn fetch_many(&mut self, size: usize) -> Result<Vec<Row>>;
}
