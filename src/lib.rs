//! Percolate SQLite connector - Rust core library
//!
//! Moves tabular data in and out of SQLite:
//! - Queries are spooled to disk in fixed-size batches, so peak memory is
//!   bounded by the batch size, then materialized as a [`Table`]
//! - Tables are copied into a destination that is created, appended to,
//!   truncated or replaced according to an `if_exists` policy
//! - Existence checks are schema-qualified; `public` is the main database
//!   and other schemas are attached databases
//!
//! Every operation that opens its own connection runs in a transaction
//! scope: commit on success, rollback on error, connection always closed.

pub mod types;
pub mod config;
pub mod driver;
pub mod scope;
pub mod spool;
pub mod table;
pub mod catalog;
pub mod provision;
pub mod otel;

// High-level connector API
pub mod connector;

pub use config::SqliteConfig;
pub use connector::{Sqlite, TableHandle};
pub use provision::{CopyOutcome, IfExists, ProvisionAction};
pub use table::Table;
pub use types::{DatabaseError, Params, Result, Row, Value};
