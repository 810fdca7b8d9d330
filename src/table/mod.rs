//! In-memory tabular results.
//!
//! A [`Table`] is an ordered list of column names plus rows of typed
//! values. The column set is fixed at construction.

mod export;

use crate::spool::SpooledArtifact;
use crate::types::{DatabaseError, Result, Row, Value};
use tracing::debug;

/// Column names plus rows of typed values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Create a table, checking every row matches the column count.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::ValidationError` on a ragged row
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        if let Some((i, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != columns.len())
        {
            return Err(DatabaseError::validation(format!(
                "Row {} has {} values, expected {}",
                i,
                row.len(),
                columns.len()
            )));
        }
        Ok(Self { columns, rows })
    }

    /// Create a table from a header and any row iterator.
    pub fn from_rows<S, I>(columns: impl IntoIterator<Item = S>, rows: I) -> Result<Self>
    where
        S: Into<String>,
        I: IntoIterator<Item = Row>,
    {
        Self::new(
            columns.into_iter().map(Into::into).collect(),
            rows.into_iter().collect(),
        )
    }

    /// Rebuild a table from a spooled artifact.
    ///
    /// Rows keep their spool order and types. The artifact's file is removed
    /// once the table is built.
    pub fn materialize(artifact: SpooledArtifact) -> Result<Self> {
        let reader = artifact.reader()?;
        let columns = reader.columns().to_vec();

        let mut rows = Vec::with_capacity(artifact.stats().rows as usize);
        for row in reader {
            rows.push(row?);
        }

        debug!(rows = rows.len(), columns = columns.len(), "Query returned rows");
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Position of a column by name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&Value>> {
        let index = self.column_index(name)?;
        Some(self.rows.iter().map(|row| &row[index]).collect())
    }

    /// First value of the first row, for single-value queries.
    pub fn first(&self) -> Option<&Value> {
        self.rows.first().and_then(|row| row.first())
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}
