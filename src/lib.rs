//! Reader core for the dBase/FoxPro table format.
//!
//! The crate parses the fixed-size table header, builds a typed column
//! [Schema](table/struct.Schema.html) from the column directory and decodes
//! individual field values out of fixed-width row buffers. It performs no
//! I/O itself: the caller hands it the complete header+directory byte block
//! once, then one `record_len`-byte row buffer per record.
//!
//! Columns with a native type code the crate does not recognize are kept as
//! [ColumnType::Unsupported](column/enum.ColumnType.html#variant.Unsupported)
//! and decode to a verbatim copy of their raw bytes instead of failing the
//! whole table.
use chrono::naive::NaiveDate;
use encoding_rs::{
    Encoding,
    BIG5, EUC_KR, GBK, IBM866, SHIFT_JIS, WINDOWS_1250, WINDOWS_1251,
    WINDOWS_1252, WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256,
    WINDOWS_874, X_MAC_CYRILLIC,
};
use log::warn;
use std::convert::TryInto;
use thiserror::Error;

#[cfg(test)]
mod tests;

pub mod column;
pub mod table;

pub use column::{Column, ColumnType, FieldDescriptor, FieldValue};
pub use table::{OverlapPolicy, Record, Schema, Table, TableOptions};

/// Byte length of the fixed header prologue.
pub const HEADER_PROLOGUE_LEN: usize = 32;

/// Errors surfaced by header parsing, schema construction and row access.
///
/// These cover the structural contract of the format only. Malformed cell
/// *content* (blank numerics, unknown logical markers, unrecognized type
/// codes) never produces an error; it degrades to sentinel values instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DbfError {
    #[error("malformed header: {0}")]
    MalformedHeader(&'static str),
    #[error("column name is empty")]
    InvalidColumnName,
    #[error("column {name} at offset {offset} does not fit the record layout")]
    InvalidOffset { name: String, offset: usize },
    #[error("duplicate column name {0}")]
    DuplicateColumnName(String),
    #[error("columns {0} and {1} overlap in the record layout")]
    ColumnsOverlap(String, String),
    #[error("row buffer is {actual} bytes, record length is {expected}")]
    RowSizeMismatch { expected: usize, actual: usize },
    #[error("no column named {0}")]
    UnknownColumn(String),
}

/// The dBase/FoxPro product family, taken from the first byte of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DBFType {
    FoxBase,
    DBaseIIIPlus,
    DBaseIV,
    DBaseV,
    VisualFoxPro,
    VisualFoxProAutoInc,
    VisualFoxProVarBLOB,
    DBaseIVSQLTableFiles,
    DBaseIVSQLSystem,
    DBaseIIIPlusMemos,
    DBaseIVMemos,
    DBaseIVSQLTable,
    FoxProMemos,
    Undefined
}

impl DBFType {
    /// Map the file-flag byte to a product family. Unrecognized flags map
    /// to [DBFType::Undefined](enum.DBFType.html#variant.Undefined) so a
    /// flag alone never blocks reading the table.
    pub fn parse_type(flag: u8) -> DBFType {
        match flag {
            0x02 => DBFType::FoxBase,
            0x03 => DBFType::DBaseIIIPlus,
            0x04 => DBFType::DBaseIV,
            0x05 => DBFType::DBaseV,
            0x30 => DBFType::VisualFoxPro,
            0x31 => DBFType::VisualFoxProAutoInc,
            0x32 => DBFType::VisualFoxProVarBLOB,
            0x43 => DBFType::DBaseIVSQLTableFiles,
            0x63 => DBFType::DBaseIVSQLSystem,
            0x83 => DBFType::DBaseIIIPlusMemos,
            0x8b => DBFType::DBaseIVMemos,
            0x8e => DBFType::DBaseIVSQLTable,
            0xf5 => DBFType::FoxProMemos,
            _ => DBFType::Undefined
        }
    }
}

/// Parsed table header.
///
/// ## Header prologue structure
/// ---
/// | Byte offset | Description |
/// ---
/// | 0 | File type flag |
/// | 1 - 3 | Last update as YY MM DD, YY counted from 1900 |
/// | 4 - 7 | Number of records (u32, little endian) |
/// | 8 - 9 | Position of first record / header length (u16, little endian) |
/// | 10 - 11 | Length of one record including the deletion flag (u16, little endian) |
/// | 12 - 27 | Reserved |
/// | 28 | Table flag |
/// | 29 | Code page mark |
/// | 30 - 31 | Reserved |
#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub db_type: DBFType,
    /// `None` when the stored YY MM DD bytes do not form a calendar date.
    pub last_update: Option<NaiveDate>,
    pub records_count: usize,
    pub header_len: usize,
    pub record_len: usize,
    pub codepage: u8
}

impl Header {
    /// Parse the fixed 32-byte prologue out of a header block.
    ///
    /// The block must be at least [HEADER_PROLOGUE_LEN](constant.HEADER_PROLOGUE_LEN.html)
    /// bytes; the stored header length must cover the prologue and the
    /// record length must be non-zero, otherwise
    /// [DbfError::MalformedHeader](enum.DbfError.html#variant.MalformedHeader)
    /// is returned.
    pub fn parse(bytes: &[u8]) -> Result<Header, DbfError> {
        if bytes.len() < HEADER_PROLOGUE_LEN {
            return Err(DbfError::MalformedHeader("block is shorter than the header prologue"));
        }
        let db_type = DBFType::parse_type(bytes[0]);
        let last_update = NaiveDate::from_ymd_opt(
            1900 + bytes[1] as i32,
            bytes[2] as u32,
            bytes[3] as u32
        );
        let records_count = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
        let header_len = u16::from_le_bytes(bytes[8..10].try_into().unwrap()) as usize;
        let record_len = u16::from_le_bytes(bytes[10..12].try_into().unwrap()) as usize;
        let codepage = bytes[29];

        if header_len < HEADER_PROLOGUE_LEN {
            return Err(DbfError::MalformedHeader("stored header length is shorter than the prologue"));
        }
        if record_len == 0 {
            return Err(DbfError::MalformedHeader("record length is zero"));
        }

        Ok(Header {
            db_type,
            last_update,
            records_count,
            header_len,
            record_len,
            codepage
        })
    }
}

/// Look up the text encoding for a code page mark.
///
/// Returns `None` for marks the crate has no mapping for, including code
/// pages (437, 850, 852, ...) that the Encoding Standard cannot represent.
pub fn codepage_encoding(codepage: u8) -> Option<&'static Encoding> {
    match codepage {
        3 => Some(WINDOWS_1252),
        101 => Some(IBM866),
        120 => Some(BIG5),
        121 => Some(EUC_KR),
        122 => Some(GBK),
        123 => Some(SHIFT_JIS),
        124 => Some(WINDOWS_874),
        125 => Some(WINDOWS_1255),
        126 => Some(WINDOWS_1256),
        150 => Some(X_MAC_CYRILLIC),
        200 => Some(WINDOWS_1250),
        201 => Some(WINDOWS_1251),
        202 => Some(WINDOWS_1254),
        203 => Some(WINDOWS_1253),
        _ => None
    }
}

/// Resolve a code page mark to an encoding, falling back to windows-1252
/// for unknown marks. A bad code page mark must not block reading the
/// non-text columns of an otherwise intact table.
pub fn resolve_encoding(codepage: u8) -> &'static Encoding {
    match codepage_encoding(codepage) {
        Some(e) => e,
        None => {
            warn!("no encoding for code page mark {}, falling back to windows-1252", codepage);
            WINDOWS_1252
        }
    }
}
