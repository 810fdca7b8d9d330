//! Spooled artifact: a temporary file holding one query result.
//!
//! Written once by [`SpoolWriter`], read back sequentially by
//! [`SpoolReader`]. The file is removed when the artifact is dropped.

use super::format;
use crate::types::{DatabaseError, Result, Row, Value};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::TempPath;

/// Counters collected while spooling.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpoolStats {
    /// Data rows written (header excluded).
    pub rows: u64,
    /// Non-empty batches fetched from the driver.
    pub batches: usize,
    /// Largest batch held in memory at once.
    pub peak_batch_rows: usize,
}

/// Incremental writer for a fresh spool file.
pub struct SpoolWriter {
    writer: BufWriter<File>,
    path: TempPath,
    columns: Vec<String>,
    body: Vec<u8>,
    stats: SpoolStats,
}

impl SpoolWriter {
    /// Create a spool file and write the header record.
    ///
    /// # Arguments
    ///
    /// * `dir` - Directory for the file; system temp dir when `None`
    /// * `columns` - Ordered column names (may be empty)
    pub fn create(dir: Option<&Path>, columns: &[String]) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("p8-spool-").suffix(".bin");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        let (file, path) = file.into_parts();

        let mut writer = BufWriter::new(file);
        format::write_file_header(&mut writer)?;

        let mut body = Vec::new();
        format::encode_header(columns, &mut body);
        format::write_record(&mut writer, &body)?;

        Ok(Self {
            writer,
            path,
            columns: columns.to_vec(),
            body,
            stats: SpoolStats::default(),
        })
    }

    /// Append one fetched batch, one record per row.
    pub fn append_batch(&mut self, batch: &[Row]) -> Result<()> {
        for row in batch {
            self.append_row(row)?;
        }
        if !batch.is_empty() {
            self.stats.batches += 1;
            self.stats.peak_batch_rows = self.stats.peak_batch_rows.max(batch.len());
        }
        Ok(())
    }

    fn append_row(&mut self, row: &[Value]) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(DatabaseError::spool(format!(
                "Row has {} values but header has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        format::encode_row(row, &mut self.body);
        format::write_record(&mut self.writer, &self.body)?;
        self.stats.rows += 1;
        Ok(())
    }

    /// Flush and hand over the finished artifact.
    pub fn finish(mut self) -> Result<SpooledArtifact> {
        self.writer.flush()?;
        let file = self
            .writer
            .into_inner()
            .map_err(|e| DatabaseError::IoError(e.into_error()))?;
        file.sync_data()?;

        Ok(SpooledArtifact {
            path: self.path,
            columns: self.columns,
            stats: self.stats,
        })
    }
}

/// A completed spool file.
#[derive(Debug)]
pub struct SpooledArtifact {
    path: TempPath,
    columns: Vec<String>,
    stats: SpoolStats,
}

impl SpooledArtifact {
    /// Location of the spool file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Column names recorded in the header.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn stats(&self) -> SpoolStats {
        self.stats
    }

    /// Open the file for a sequential read from the first row.
    pub fn reader(&self) -> Result<SpoolReader> {
        SpoolReader::open(&self.path)
    }
}

/// Sequential reader yielding rows in spool order.
pub struct SpoolReader {
    reader: BufReader<File>,
    columns: Vec<String>,
    body: Vec<u8>,
    failed: bool,
}

impl SpoolReader {
    /// Open a spool file and read its header record.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError::SpoolError` if the file is not a spool file or
    /// its header record is missing
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        format::read_file_header(&mut reader)?;

        let mut body = Vec::new();
        if !format::read_record(&mut reader, &mut body)? {
            return Err(DatabaseError::spool("Missing header record"));
        }
        let columns = format::decode_header(&body)?;

        Ok(Self {
            reader,
            columns,
            body,
            failed: false,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        if !format::read_record(&mut self.reader, &mut self.body)? {
            return Ok(None);
        }
        let row = format::decode_row(&self.body)?;
        if row.len() != self.columns.len() {
            return Err(DatabaseError::spool(format!(
                "Row has {} values but header has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        Ok(Some(row))
    }
}

impl Iterator for SpoolReader {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_row() {
            Ok(row) => row.map(Ok),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::tempdir;

    fn columns() -> Vec<String> {
        vec!["id".to_string(), "name".to_string()]
    }

    #[test]
    fn test_header_only_artifact() {
        let dir = tempdir().unwrap();
        let artifact = SpoolWriter::create(Some(dir.path()), &columns())
            .unwrap()
            .finish()
            .unwrap();

        let reader = artifact.reader().unwrap();
        assert_eq!(reader.columns(), columns().as_slice());
        assert_eq!(reader.count(), 0);
        assert_eq!(artifact.stats(), SpoolStats::default());
    }

    #[test]
    fn test_rows_read_back_in_order() {
        let dir = tempdir().unwrap();
        let mut writer = SpoolWriter::create(Some(dir.path()), &columns()).unwrap();
        writer
            .append_batch(&[
                vec![Value::Integer(1), Value::from("a")],
                vec![Value::Integer(2), Value::Null],
            ])
            .unwrap();
        writer
            .append_batch(&[vec![Value::Integer(3), Value::from("c")]])
            .unwrap();
        let artifact = writer.finish().unwrap();

        let rows: Vec<Row> = artifact.reader().unwrap().map(|r| r.unwrap()).collect();
        let ids: Vec<&Value> = rows.iter().map(|r| &r[0]).collect();
        assert_eq!(ids, [&Value::Integer(1), &Value::Integer(2), &Value::Integer(3)]);
        assert_eq!(rows[1][1], Value::Null);
        assert_eq!(
            artifact.stats(),
            SpoolStats {
                rows: 3,
                batches: 2,
                peak_batch_rows: 2
            }
        );
    }

    #[test]
    fn test_row_width_must_match_header() {
        let dir = tempdir().unwrap();
        let mut writer = SpoolWriter::create(Some(dir.path()), &columns()).unwrap();
        let err = writer.append_batch(&[vec![Value::Integer(1)]]).unwrap_err();
        assert!(matches!(err, DatabaseError::SpoolError(_)));
    }

    #[test]
    fn test_file_removed_on_drop() {
        let dir = tempdir().unwrap();
        let artifact = SpoolWriter::create(Some(dir.path()), &columns())
            .unwrap()
            .finish()
            .unwrap();
        let path = artifact.path().to_path_buf();
        assert!(path.exists());
        drop(artifact);
        assert!(!path.exists());
    }

    #[test]
    fn test_reader_rejects_foreign_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("not-a-spool.bin");
        File::create(&path)
            .unwrap()
            .write_all(b"id,name\n1,a\n")
            .unwrap();

        assert!(matches!(
            SpoolReader::open(&path),
            Err(DatabaseError::SpoolError(_))
        ));
    }
}
