//! CSV export and import for tables.
//!
//! Export renders nulls as empty fields and dates/timestamps in ISO-8601.
//! Import reads fields as text, or infers typed values with
//! [`Table::from_csv_typed`]; empty fields are null either way. JSON export
//! is used by the CLI.

use super::Table;
use crate::types::{Result, Value};
use std::path::Path;

impl Table {
    /// Write the table to a CSV file with a header row.
    ///
    /// # Arguments
    ///
    /// * `path` - Output file path
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::CsvError` if writing fails
    pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Write the table as CSV to any writer, such as stdout.
    pub fn to_csv_writer<W: std::io::Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::Writer::from_writer(out);
        self.write_csv(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    fn write_csv<W: std::io::Write>(&self, writer: &mut csv::Writer<W>) -> Result<()> {
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(Value::to_string))?;
        }
        Ok(())
    }

    /// Rows as a JSON array of objects keyed by column name.
    pub fn to_json_records(&self) -> serde_json::Value {
        let records = self
            .rows
            .iter()
            .map(|row| {
                let record: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(Value::to_json))
                    .collect();
                serde_json::Value::Object(record)
            })
            .collect();
        serde_json::Value::Array(records)
    }

    /// Read a CSV file with a header row into a table of text values.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Table> {
        read_csv(path.as_ref(), |field| Value::Text(field.to_string()))
    }

    /// Read a CSV file, inferring each field's type with [`Value::infer`].
    pub fn from_csv_typed<P: AsRef<Path>>(path: P) -> Result<Table> {
        read_csv(path.as_ref(), Value::infer)
    }
}

fn read_csv(path: &Path, convert: impl Fn(&str) -> Value) -> Result<Table> {
    let mut reader = csv::Reader::from_path(path)?;
    let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Null
                    } else {
                        convert(field)
                    }
                })
                .collect(),
        );
    }
    Table::new(columns, rows)
}
