//! Database operation spans.

use tracing::{field, span, Level, Span};

/// Database operation types (maps to `db.operation.name`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbOperation {
    /// Read query spooled into a table
    Query,
    /// Table/view existence probe
    Exists,
    /// Provision a destination and bulk-load rows
    Copy,
    /// CREATE TABLE
    Create,
    /// DELETE FROM without predicate
    Truncate,
    /// DROP TABLE
    Drop,
}

impl DbOperation {
    /// Get operation name as string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Exists => "exists",
            Self::Copy => "copy",
            Self::Create => "create",
            Self::Truncate => "truncate",
            Self::Drop => "drop",
        }
    }
}

/// Create database operation span.
///
/// # Arguments
///
/// * `operation` - Database operation type
/// * `collection` - Target table name
///
/// # Example
///
/// ```rust,ignore
/// let span = db_span(DbOperation::Copy, "public.events");
/// let _guard = span.enter();
/// ```
pub fn db_span(operation: DbOperation, collection: &str) -> Span {
    span!(
        Level::INFO,
        "db",
        otel.name = %format!("{} {}", operation.as_str(), collection),
        otel.kind = "client",
        db.system.name = "sqlite",
        db.operation.name = operation.as_str(),
        db.collection.name = collection,
        db.response.returned_rows = field::Empty,
        db.response.affected_rows = field::Empty,
    )
}

/// Create database query span.
///
/// # Arguments
///
/// * `query_text` - SQL statement text
/// * `collection` - Target table, if known
pub fn db_query_span(query_text: &str, collection: Option<&str>) -> Span {
    let span = span!(
        Level::INFO,
        "db.query",
        otel.name = %format!("query {}", collection.unwrap_or("sqlite")),
        otel.kind = "client",
        db.system.name = "sqlite",
        db.operation.name = DbOperation::Query.as_str(),
        db.query.text = query_text,
        db.collection.name = field::Empty,
        db.response.returned_rows = field::Empty,
        db.response.affected_rows = field::Empty,
    );

    if let Some(coll) = collection {
        span.record("db.collection.name", coll);
    }

    span
}

/// Record row counts on the current span.
///
/// # Example
///
/// ```rust,ignore
/// let span = db_span(DbOperation::Copy, "events");
/// let _guard = span.enter();
/// let copied = bulk_copy(...)?;
/// record_db_metrics(None, Some(copied));
/// ```
pub fn record_db_metrics(rows_returned: Option<usize>, rows_affected: Option<usize>) {
    let span = Span::current();
    if let Some(returned) = rows_returned {
        span.record("db.response.returned_rows", returned);
    }
    if let Some(affected) = rows_affected {
        span.record("db.response.affected_rows", affected);
    }
}
