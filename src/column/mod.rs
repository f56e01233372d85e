//! Column type system and per-cell decoding.
//!
//! A [Column](struct.Column.html) knows its place inside a row buffer and
//! how to interpret the bytes there. It never owns a buffer; the row
//! decoder in [table](../table/index.html) borrows one per call and hands
//! it down here after the single row-length check.
use chrono::naive::NaiveDate;
use encoding_rs::Encoding;
use std::convert::TryInto;
use std::str;

use crate::{DbfError, Header, HEADER_PROLOGUE_LEN};


/// Byte length of one entry in the column directory.
pub const FIELD_DESCRIPTOR_LEN: usize = 32;

/// Terminator byte that closes the column directory.
const FIELD_TERMINATOR: u8 = 0x0D;

/// One raw entry of the column directory, before the factory turns it into
/// a typed [Column](struct.Column.html).
///
/// ## Field subrecords structure
/// ---
/// | Byte offset | Description |
/// ---
/// | 0 - 10 | Field name, right hand padded with 0 |
/// | 11 | Field type:<br/>C - Character<br/>N - Numeric<br/>F - Float<br/>D - Date<br/>L - Logical<br/>I - Integer<br/>others - kept verbatim as unsupported |
/// | 12 - 15 | Displacement of field in record (u32, little endian) |
/// | 16 | Length of field (bytes) |
/// | 17 | Number of decimal places |
/// | 18 - 31 | Flags and reserved bytes, not interpreted here |
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub native_type: u8,
    pub offset: usize,
    pub size: usize,
    pub precision: usize
}

/// Walk the column directory that follows the header prologue.
///
/// Entries are read until the 0x0D terminator. dBase III writers leave the
/// displacement bytes zeroed, so a zero displacement falls back to a
/// running offset that starts at 1, right after the deletion flag byte.
/// A block that runs out before the terminator fails with
/// [DbfError::MalformedHeader](../enum.DbfError.html#variant.MalformedHeader).
pub fn read_descriptors(
    block: &[u8],
    header: &Header,
    encoding: &'static Encoding
) -> Result<Vec<FieldDescriptor>, DbfError> {
    let end = header.header_len.min(block.len());
    let mut descriptors = vec![];
    let mut pos = HEADER_PROLOGUE_LEN;
    let mut next_offset = 1;

    loop {
        if pos >= end {
            return Err(DbfError::MalformedHeader("column directory is not terminated"));
        }
        if block[pos] == FIELD_TERMINATOR {
            return Ok(descriptors);
        }
        if pos + FIELD_DESCRIPTOR_LEN > end {
            return Err(DbfError::MalformedHeader("column directory entry is truncated"));
        }
        let entry = &block[pos..pos + FIELD_DESCRIPTOR_LEN];

        let name_len = entry[0..11].iter().position(|b| *b == 0).unwrap_or(11);
        let (name, _, _) = encoding.decode(&entry[0..name_len]);
        let native_type = entry[11];
        let stored = u32::from_le_bytes(entry[12..16].try_into().unwrap()) as usize;
        let size = entry[16] as usize;
        let precision = entry[17] as usize;

        let offset = if stored != 0 { stored } else { next_offset };
        next_offset = offset + size;

        descriptors.push(FieldDescriptor {
            name: name.trim_end().to_string(),
            native_type,
            offset,
            size,
            precision
        });
        pos += FIELD_DESCRIPTOR_LEN;
    }
}

/// Interpretation of a column's bytes. A closed set of known kinds plus an
/// `Unsupported` catch-all; unknown native type codes land there instead of
/// failing the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// Fixed-width text, padded with trailing spaces or NULs.
    Character,
    /// ASCII digit text parsed as a decimal; covers both N and F codes.
    /// `precision` is the declared number of decimal places.
    Numeric { precision: usize },
    /// Single-byte tri-state flag.
    Logical,
    /// Eight ASCII digits, YYYYMMDD.
    Date,
    /// Four-byte little-endian signed integer.
    Integer,
    /// Anything else. Decodes to a verbatim copy of the raw bytes.
    Unsupported
}

/// A decoded cell value.
///
/// The inner `None` of the `Numeric`, `Logical` and `Date` variants is the
/// "no value" result for blank or uninterpretable content; it is a designed
/// outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Character(String),
    Numeric(Option<f64>),
    Logical(Option<bool>),
    Date(Option<NaiveDate>),
    Integer(i32),
    /// Raw bytes of an unsupported column, copied out of the row buffer so
    /// the value outlives it.
    Raw(Vec<u8>)
}

/// One entry of a table schema: name, place inside the row and decode rule.
///
/// Immutable after construction. The native type byte is kept on every
/// column, including the typed ones, for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    offset: usize,
    size: usize,
    native_type: u8,
    kind: ColumnType
}

impl Column {
    /// Build a column from directory metadata, dispatching on the native
    /// type byte.
    ///
    /// Unrecognized type codes produce an
    /// [Unsupported](enum.ColumnType.html#variant.Unsupported) column
    /// carrying the code verbatim; that path never fails. The only errors
    /// are structural: an empty name
    /// ([DbfError::InvalidColumnName](../enum.DbfError.html#variant.InvalidColumnName))
    /// or a zero size
    /// ([DbfError::InvalidOffset](../enum.DbfError.html#variant.InvalidOffset)).
    pub fn new(
        name: &str,
        offset: usize,
        size: usize,
        native_type: u8,
        precision: usize
    ) -> Result<Column, DbfError> {
        if name.is_empty() {
            return Err(DbfError::InvalidColumnName);
        }
        if size == 0 {
            return Err(DbfError::InvalidOffset { name: name.to_string(), offset });
        }
        let kind = match native_type {
            b'C' => ColumnType::Character,
            b'N' | b'F' => ColumnType::Numeric { precision },
            b'L' => ColumnType::Logical,
            b'D' => ColumnType::Date,
            // An I column of any width other than 4 is not something this
            // crate knows how to read; keep its bytes instead of guessing.
            b'I' if size == 4 => ColumnType::Integer,
            _ => ColumnType::Unsupported
        };

        Ok(Column {
            name: name.to_string(),
            offset,
            size,
            native_type,
            kind
        })
    }

    pub fn from_descriptor(descriptor: &FieldDescriptor) -> Result<Column, DbfError> {
        Column::new(
            &descriptor.name,
            descriptor.offset,
            descriptor.size,
            descriptor.native_type,
            descriptor.precision
        )
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn native_type(&self) -> u8 {
        self.native_type
    }

    pub fn kind(&self) -> &ColumnType {
        &self.kind
    }

    /// Decode this column's slice of a row buffer.
    ///
    /// Assumes `row.len() >= offset + size`; the row decoder checks the
    /// whole buffer once before any column is consulted. Given that, this
    /// never fails: malformed content degrades to the "no value" sentinel
    /// of the matching [FieldValue](enum.FieldValue.html) variant.
    pub fn decode(&self, row: &[u8], encoding: &'static Encoding) -> FieldValue {
        let raw = &row[self.offset..self.offset + self.size];
        match self.kind {
            ColumnType::Character => {
                let (text, _, _) = encoding.decode(raw);
                let trimmed = text.trim_end_matches(|c: char| c == ' ' || c == '\0');
                FieldValue::Character(trimmed.to_string())
            },
            ColumnType::Numeric { .. } => {
                FieldValue::Numeric(ascii_content(raw).parse().ok())
            },
            ColumnType::Logical => {
                let state = match raw[0] {
                    b'T' | b't' | b'Y' | b'y' => Some(true),
                    b'F' | b'f' | b'N' | b'n' => Some(false),
                    _ => None
                };
                FieldValue::Logical(state)
            },
            ColumnType::Date => {
                let text = ascii_content(raw);
                if text.is_empty() {
                    FieldValue::Date(None)
                } else {
                    FieldValue::Date(NaiveDate::parse_from_str(text, "%Y%m%d").ok())
                }
            },
            ColumnType::Integer => {
                match raw.try_into() {
                    Ok(bytes) => FieldValue::Integer(i32::from_le_bytes(bytes)),
                    Err(_) => FieldValue::Raw(raw.to_vec())
                }
            },
            ColumnType::Unsupported => FieldValue::Raw(raw.to_vec())
        }
    }
}

/// View a numeric/date slice as trimmed ASCII text. Non-ASCII garbage in a
/// field that should hold digits yields an empty string, which the callers
/// turn into their "no value" sentinel.
fn ascii_content(raw: &[u8]) -> &str {
    match str::from_utf8(raw) {
        Ok(text) => text.trim_matches(|c: char| c == ' ' || c == '\0'),
        Err(_) => ""
    }
}
