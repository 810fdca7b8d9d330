//! Tracing instrumentation following OpenTelemetry database conventions.
//!
//! - https://opentelemetry.io/docs/specs/semconv/database/database-spans/
//!
//! **Span naming**: `{db.operation.name} {target}`
//! - Example: `query users`, `copy main.events`, `exists public.foo`
//!
//! **Attributes**:
//! - `db.system.name`: Always `"sqlite"`
//! - `db.collection.name`: Target table, when known
//! - `db.operation.name`: Operation type
//! - `db.query.text`: Statement text for queries
//!
//! Spans are plain `tracing` spans; exporting them is up to the subscriber
//! the host application installs.

pub mod db;

pub use db::{db_query_span, db_span, record_db_metrics, DbOperation};
