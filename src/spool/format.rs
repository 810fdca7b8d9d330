//! Spool file record format.
//!
//! # File Format
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Magic: "P8SPOOL\0" (8 bytes)                 │
//! │ Version: u32                                 │
//! ├──────────────────────────────────────────────┤
//! │ Record: len u32 | kind u8 | body             │
//! │   kind 'H' (first record): count u32, names  │
//! │   kind 'R' (every later record): count u32,  │
//! │            tagged values                     │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Integers are little-endian. Strings and blobs are `len u32 | bytes`.
//!
//! # Value tags
//!
//! | tag | value | body |
//! |-----|-------|------|
//! | 0 | null | - |
//! | 1 | integer | i64 |
//! | 2 | real | f64 bits as u64 |
//! | 3 | text | len u32, UTF-8 |
//! | 4 | blob | len u32, bytes |
//! | 5 | boolean | u8 |
//! | 6 | date | i32 days from CE |
//! | 7 | timestamp | i64 unix seconds, u32 nanos |

use crate::types::{DatabaseError, Result, Row, Value};
use chrono::{Datelike, NaiveDate};
use std::io::{ErrorKind, Read, Write};

/// Magic number for file format validation.
pub const MAGIC: &[u8; 8] = b"P8SPOOL\0";

/// Current file format version.
pub const VERSION: u32 = 1;

const KIND_HEADER: u8 = b'H';
const KIND_ROW: u8 = b'R';

const TAG_NULL: u8 = 0;
const TAG_INTEGER: u8 = 1;
const TAG_REAL: u8 = 2;
const TAG_TEXT: u8 = 3;
const TAG_BLOB: u8 = 4;
const TAG_BOOLEAN: u8 = 5;
const TAG_DATE: u8 = 6;
const TAG_TIMESTAMP: u8 = 7;

/// Write magic and version.
pub fn write_file_header<W: Write>(w: &mut W) -> Result<()> {
    w.write_all(MAGIC)?;
    w.write_all(&VERSION.to_le_bytes())?;
    Ok(())
}

/// Read and validate magic and version.
///
/// # Errors
///
/// Returns `DatabaseError::SpoolError` if magic number or version is invalid
pub fn read_file_header<R: Read>(r: &mut R) -> Result<()> {
    let mut magic = [0u8; 8];
    read_exact(r, &mut magic, "file header")?;
    if &magic != MAGIC {
        return Err(DatabaseError::spool(format!(
            "Invalid magic bytes: expected {:?}, got {:?}",
            MAGIC, magic
        )));
    }

    let mut version = [0u8; 4];
    read_exact(r, &mut version, "file version")?;
    let version = u32::from_le_bytes(version);
    if version != VERSION {
        return Err(DatabaseError::spool(format!(
            "Unsupported version: expected {}, got {}",
            VERSION, version
        )));
    }
    Ok(())
}

/// Encode the column header record body into `buf`.
pub fn encode_header(columns: &[String], buf: &mut Vec<u8>) {
    buf.clear();
    buf.push(KIND_HEADER);
    put_len(buf, columns.len());
    for name in columns {
        put_bytes(buf, name.as_bytes());
    }
}

/// Encode a row record body into `buf`.
pub fn encode_row(row: &[Value], buf: &mut Vec<u8>) {
    buf.clear();
    buf.push(KIND_ROW);
    put_len(buf, row.len());
    for value in row {
        encode_value(value, buf);
    }
}

fn encode_value(value: &Value, buf: &mut Vec<u8>) {
    match value {
        Value::Null => buf.push(TAG_NULL),
        Value::Integer(i) => {
            buf.push(TAG_INTEGER);
            buf.extend_from_slice(&i.to_le_bytes());
        }
        Value::Real(r) => {
            buf.push(TAG_REAL);
            buf.extend_from_slice(&r.to_bits().to_le_bytes());
        }
        Value::Text(s) => {
            buf.push(TAG_TEXT);
            put_bytes(buf, s.as_bytes());
        }
        Value::Blob(b) => {
            buf.push(TAG_BLOB);
            put_bytes(buf, b);
        }
        Value::Boolean(b) => {
            buf.push(TAG_BOOLEAN);
            buf.push(u8::from(*b));
        }
        Value::Date(d) => {
            buf.push(TAG_DATE);
            buf.extend_from_slice(&d.num_days_from_ce().to_le_bytes());
        }
        Value::Timestamp(ts) => {
            let utc = ts.and_utc();
            buf.push(TAG_TIMESTAMP);
            buf.extend_from_slice(&utc.timestamp().to_le_bytes());
            buf.extend_from_slice(&utc.timestamp_subsec_nanos().to_le_bytes());
        }
    }
}

fn put_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u32).to_le_bytes());
}

fn put_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    put_len(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

/// Write one length-prefixed record.
pub fn write_record<W: Write>(w: &mut W, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len())
        .map_err(|_| DatabaseError::spool(format!("Record too large: {} bytes", body.len())))?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(body)?;
    Ok(())
}

/// Read one record body into `buf`.
///
/// # Returns
///
/// `false` at a clean end of file, `true` when a record was read
///
/// # Errors
///
/// Returns `DatabaseError::SpoolError` if the file ends mid-record
pub fn read_record<R: Read>(r: &mut R, buf: &mut Vec<u8>) -> Result<bool> {
    let mut len = [0u8; 4];
    let mut filled = 0;
    while filled < len.len() {
        match r.read(&mut len[filled..]) {
            Ok(0) if filled == 0 => return Ok(false),
            Ok(0) => return Err(DatabaseError::spool("Truncated record length")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    buf.clear();
    buf.resize(u32::from_le_bytes(len) as usize, 0);
    read_exact(r, buf, "record body")?;
    Ok(true)
}

fn read_exact<R: Read>(r: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    r.read_exact(buf).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            DatabaseError::spool(format!("Truncated {}", what))
        } else {
            e.into()
        }
    })
}

/// Decode a header record body.
pub fn decode_header(body: &[u8]) -> Result<Vec<String>> {
    let mut d = Decoder::new(body);
    d.expect_kind(KIND_HEADER)?;
    let count = d.u32()? as usize;
    let mut columns = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        columns.push(d.string()?);
    }
    d.finish()?;
    Ok(columns)
}

/// Decode a row record body.
pub fn decode_row(body: &[u8]) -> Result<Row> {
    let mut d = Decoder::new(body);
    d.expect_kind(KIND_ROW)?;
    let count = d.u32()? as usize;
    let mut row = Vec::with_capacity(count.min(4096));
    for _ in 0..count {
        row.push(d.value()?);
    }
    d.finish()?;
    Ok(row)
}

/// Bounds-checked reader over one record body.
struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or_else(|| DatabaseError::spool("Record body shorter than declared"))?;
        let buf = self.buf;
        self.pos = end;
        let bytes = &buf[end - n..end];
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    fn i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.array()?))
    }

    fn bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    fn string(&mut self) -> Result<String> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| DatabaseError::spool(format!("Invalid UTF-8 in record: {}", e)))
    }

    fn expect_kind(&mut self, kind: u8) -> Result<()> {
        let found = self.u8()?;
        if found != kind {
            return Err(DatabaseError::spool(format!(
                "Unexpected record kind: expected {:?}, got {:?}",
                kind as char, found as char
            )));
        }
        Ok(())
    }

    fn value(&mut self) -> Result<Value> {
        let tag = self.u8()?;
        Ok(match tag {
            TAG_NULL => Value::Null,
            TAG_INTEGER => Value::Integer(self.i64()?),
            TAG_REAL => Value::Real(f64::from_bits(u64::from_le_bytes(self.array()?))),
            TAG_TEXT => Value::Text(self.string()?),
            TAG_BLOB => Value::Blob(self.bytes()?.to_vec()),
            TAG_BOOLEAN => Value::Boolean(self.u8()? != 0),
            TAG_DATE => {
                let days = self.i32()?;
                let date = NaiveDate::from_num_days_from_ce_opt(days)
                    .ok_or_else(|| DatabaseError::spool(format!("Date out of range: {}", days)))?;
                Value::Date(date)
            }
            TAG_TIMESTAMP => {
                let secs = self.i64()?;
                let nanos = self.u32()?;
                let ts = chrono::DateTime::from_timestamp(secs, nanos).ok_or_else(|| {
                    DatabaseError::spool(format!("Timestamp out of range: {}.{}", secs, nanos))
                })?;
                Value::Timestamp(ts.naive_utc())
            }
            other => return Err(DatabaseError::spool(format!("Unknown value tag: {}", other))),
        })
    }

    fn finish(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(DatabaseError::spool(format!(
                "{} trailing bytes in record",
                self.buf.len() - self.pos
            )));
        }
        Ok(())
    }
}
