//! Schema, row decoding and the table composition root.
use encoding_rs::Encoding;
use log::debug;
use std::collections::HashMap;

use crate::column::{read_descriptors, Column, FieldValue};
use crate::{resolve_encoding, DbfError, Header};


/// Byte that marks a record as deleted in its reserved first byte.
const DELETED_FLAG: u8 = b'*';

/// What to do with directory entries whose byte ranges overlap.
///
/// Some producers emit redundant overlapping descriptors, so tolerating
/// them is a legitimate mode; the strict default treats an overlap as the
/// corruption it usually is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlapPolicy {
    Reject,
    Allow
}

/// Ordered, name-indexed collection of columns for one table.
///
/// Built once from the column directory and immutable afterwards. Names
/// are matched without regard to ASCII case, the way the format treats
/// them.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    record_len: usize
}

impl Schema {
    /// Build a schema under the strict overlap policy.
    pub fn new(columns: Vec<Column>, record_len: usize) -> Result<Schema, DbfError> {
        Schema::with_policy(columns, record_len, OverlapPolicy::Reject)
    }

    /// Build a schema, validating every structural invariant once:
    /// unique names, `offset >= 1` (byte 0 of a row is the deletion flag),
    /// `offset + size <= record_len`, and, under
    /// [OverlapPolicy::Reject](enum.OverlapPolicy.html#variant.Reject),
    /// disjoint byte ranges.
    pub fn with_policy(
        columns: Vec<Column>,
        record_len: usize,
        overlap: OverlapPolicy
    ) -> Result<Schema, DbfError> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if column.offset() == 0 || column.offset() + column.size() > record_len {
                return Err(DbfError::InvalidOffset {
                    name: column.name().to_string(),
                    offset: column.offset()
                });
            }
            let key = column.name().to_ascii_uppercase();
            if index.insert(key, i).is_some() {
                return Err(DbfError::DuplicateColumnName(column.name().to_string()));
            }
        }

        if overlap == OverlapPolicy::Reject {
            let mut spans: Vec<&Column> = columns.iter().collect();
            spans.sort_by_key(|c| c.offset());
            for pair in spans.windows(2) {
                if pair[0].offset() + pair[0].size() > pair[1].offset() {
                    return Err(DbfError::ColumnsOverlap(
                        pair[0].name().to_string(),
                        pair[1].name().to_string()
                    ));
                }
            }
        }

        Ok(Schema { columns, index, record_len })
    }

    pub fn columns(&self) -> &[Column] {
        self.columns.as_slice()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn record_len(&self) -> usize {
        self.record_len
    }

    /// Position of a column by name, ASCII case-insensitive.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(&name.to_ascii_uppercase()).copied()
    }

    pub fn get(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    pub fn column_at(&self, position: usize) -> Option<&Column> {
        self.columns.get(position)
    }
}

/// Typed view over one row buffer.
///
/// Borrows the schema and the buffer for its own lifetime only; decoded
/// values are owned and never alias the buffer, so the caller may reuse
/// or pool buffers between rows. Nothing is cached: reading the same
/// column twice decodes twice.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    schema: &'a Schema,
    row: &'a [u8],
    encoding: &'static Encoding
}

impl<'a> Record<'a> {
    /// Wrap a row buffer. This is the single bounds gate for every decode
    /// call made through the view: a buffer of the wrong length fails here
    /// with [DbfError::RowSizeMismatch](../enum.DbfError.html#variant.RowSizeMismatch)
    /// and no column ever sees it.
    pub fn new(
        schema: &'a Schema,
        row: &'a [u8],
        encoding: &'static Encoding
    ) -> Result<Record<'a>, DbfError> {
        if row.len() != schema.record_len() {
            return Err(DbfError::RowSizeMismatch {
                expected: schema.record_len(),
                actual: row.len()
            });
        }
        Ok(Record { schema, row, encoding })
    }

    /// Decode the named column out of this row.
    pub fn value(&self, name: &str) -> Result<FieldValue, DbfError> {
        let column = self.schema
            .get(name)
            .ok_or_else(|| DbfError::UnknownColumn(name.to_string()))?;
        Ok(column.decode(self.row, self.encoding))
    }

    /// Decode the column at `position`, `None` past the last column.
    pub fn value_at(&self, position: usize) -> Option<FieldValue> {
        self.schema
            .column_at(position)
            .map(|column| column.decode(self.row, self.encoding))
    }

    /// Decode every column in schema order.
    pub fn values(&self) -> impl Iterator<Item = (&'a str, FieldValue)> + '_ {
        let row = self.row;
        let encoding = self.encoding;
        self.schema
            .columns()
            .iter()
            .map(move |column| (column.name(), column.decode(row, encoding)))
    }

    /// Whether the reserved first byte flags this record as deleted.
    pub fn is_deleted(&self) -> bool {
        self.row.first() == Some(&DELETED_FLAG)
    }
}

/// Per-table configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableOptions {
    /// Replaces the header-resolved encoding for all text decoding when
    /// set. An explicit override always wins.
    pub encoding_override: Option<&'static Encoding>,
    pub overlap: Option<OverlapPolicy>
}

/// Composition root: owns the parsed header and the schema, borrows row
/// buffers from the caller one at a time.
#[derive(Debug, Clone)]
pub struct Table {
    header: Header,
    schema: Schema,
    encoding: &'static Encoding
}

impl Table {
    /// Assemble a table from already built parts. The schema's record
    /// length is what row buffers are checked against.
    pub fn new(header: Header, schema: Schema, encoding: &'static Encoding) -> Table {
        Table { header, schema, encoding }
    }

    /// Open a table from its complete header+directory byte block with
    /// default options.
    pub fn open(block: &[u8]) -> Result<Table, DbfError> {
        Table::open_with(block, TableOptions::default())
    }

    /// Open a table from its complete header+directory byte block.
    ///
    /// Parses the prologue, resolves the text encoding (override first,
    /// then the code page mark, then the documented windows-1252 default),
    /// reads the column directory and builds the schema.
    pub fn open_with(block: &[u8], options: TableOptions) -> Result<Table, DbfError> {
        let header = Header::parse(block)?;
        let encoding = options.encoding_override
            .unwrap_or_else(|| resolve_encoding(header.codepage));
        let descriptors = read_descriptors(block, &header, encoding)?;
        let columns = descriptors
            .iter()
            .map(Column::from_descriptor)
            .collect::<Result<Vec<Column>, DbfError>>()?;
        let schema = Schema::with_policy(
            columns,
            header.record_len,
            options.overlap.unwrap_or(OverlapPolicy::Reject)
        )?;
        debug!(
            "opened {:?} table: {} columns, {} records of {} bytes, encoding {}",
            header.db_type,
            schema.len(),
            header.records_count,
            header.record_len,
            encoding.name()
        );
        Ok(Table { header, schema, encoding })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn columns(&self) -> &[Column] {
        self.schema.columns()
    }

    /// Number of physical records the header declares.
    pub fn records_count(&self) -> usize {
        self.header.records_count
    }

    /// The encoding used for text decoding, after any override.
    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Typed view over one externally fetched row buffer. The buffer must
    /// be exactly `record_len` bytes.
    pub fn record<'a>(&'a self, row: &'a [u8]) -> Result<Record<'a>, DbfError> {
        Record::new(&self.schema, row, self.encoding)
    }

    /// Pair externally fetched row buffers with their index and a typed
    /// view. The caller drives fetching; this only decodes.
    pub fn records<'a, I>(
        &'a self,
        rows: I
    ) -> impl Iterator<Item = (usize, Result<Record<'a>, DbfError>)>
    where
        I: IntoIterator<Item = &'a [u8]>,
        I::IntoIter: 'a
    {
        rows.into_iter()
            .enumerate()
            .map(move |(i, row)| (i, self.record(row)))
    }
}
