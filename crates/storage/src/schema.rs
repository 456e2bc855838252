//! # Record Schemas
//!
//! A record layout is declared once as an ordered table of fields, each
//! tagged with the first file version that contains it. Readers and writers
//! walk that table instead of branching on versions at every call site:
//!
//! - [`RecordReader`] reads a record in the layout of the file's version;
//!   fields the version lacks yield their declared default.
//! - [`RecordWriter`] always writes the current layout.
//!
//! Byte offsets of fixed-width fields can be derived with
//! [`Schema::fixed_offset`], which is how in-place updates find their target.

use crate::error::{Result, StorageError};
use bytes::{Buf, BufMut};
use std::collections::BTreeMap;

/// Encoded type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U16,
    U32,
    U64,
    /// `u32` byte length + UTF-8 bytes
    Str,
    /// `u64` pair count + (key, value) string pairs
    Table,
}

impl FieldKind {
    /// Encoded width of fixed-width kinds
    pub const fn width(&self) -> Option<usize> {
        match self {
            Self::U8 => Some(1),
            Self::U16 => Some(2),
            Self::U32 => Some(4),
            Self::U64 => Some(8),
            Self::Str | Self::Table => None,
        }
    }
}

/// One declared field
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,

    /// First file version containing this field
    pub since: u8,

    /// Value read for integer fields absent from an older version
    pub default: u64,
}

impl Field {
    pub const fn new(name: &'static str, kind: FieldKind, since: u8) -> Self {
        Self {
            name,
            kind,
            since,
            default: 0,
        }
    }

    pub const fn with_default(mut self, default: u64) -> Self {
        self.default = default;
        self
    }
}

/// Ordered field table of one record type
#[derive(Debug)]
pub struct Schema {
    pub name: &'static str,

    /// Version written by this code
    pub current: u8,

    /// Oldest version that can still be read (and upgraded)
    pub oldest: u8,

    pub fields: &'static [Field],
}

impl Schema {
    /// Whether files of `version` can be read
    #[inline]
    pub fn supports(&self, version: u8) -> bool {
        (self.oldest..=self.current).contains(&version)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Whether `name` is stored in files of `version`
    pub fn has_field(&self, name: &str, version: u8) -> bool {
        self.index_of(name)
            .map(|i| self.fields[i].since <= version)
            .unwrap_or(false)
    }

    /// Byte offset of `name` from the start of a record in `version`
    ///
    /// # Returns
    /// `None` when the field is unknown, absent in that version, or preceded
    /// by a variable-width field
    pub fn fixed_offset(&self, name: &str, version: u8) -> Option<usize> {
        let index = self.index_of(name)?;
        if self.fields[index].since > version {
            return None;
        }

        self.fields[..index]
            .iter()
            .filter(|f| f.since <= version)
            .try_fold(0usize, |offset, f| f.kind.width().map(|w| offset + w))
    }
}

/// A record type stored through a [`Schema`]
pub trait Record: Sized {
    const SCHEMA: &'static Schema;

    /// Decode one record
    fn read(reader: &mut RecordReader<'_>) -> Result<Self>;

    /// Encode one record in the current layout
    fn write(&self, writer: &mut RecordWriter<'_>) -> Result<()>;
}

/// Longest string a record may hold; larger length prefixes are corruption
pub const MAX_STRING_LEN: usize = 1 << 20;

/// Most key/value pairs a table field may hold
pub const MAX_TABLE_ENTRIES: u64 = 1 << 16;

/// Sequential field reader for one record
pub struct RecordReader<'a> {
    schema: &'static Schema,
    version: u8,
    buf: &'a [u8],
    start_len: usize,

    /// Offset of the record in the file (for error reports)
    base: u64,
    next_field: usize,
}

impl<'a> RecordReader<'a> {
    /// Read a record of `version` from the start of `data`
    pub fn new(schema: &'static Schema, version: u8, data: &'a [u8], base: u64) -> Self {
        Self {
            schema,
            version,
            buf: data,
            start_len: data.len(),
            base,
            next_field: 0,
        }
    }

    /// Bytes consumed so far
    #[inline]
    pub fn consumed(&self) -> usize {
        self.start_len - self.buf.len()
    }

    #[inline]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Advance to `name`; `None` when the field is absent in this version
    ///
    /// Fields must be read in declaration order, none skipped.
    fn field(&mut self, name: &str, kind: FieldKind) -> Result<Option<Field>> {
        let field = *self.schema.fields.get(self.next_field).ok_or_else(|| {
            StorageError::Schema(format!("{}: extra field '{}'", self.schema.name, name))
        })?;
        if field.name != name || field.kind != kind {
            return Err(StorageError::Schema(format!(
                "{}: read '{}' as {:?} where '{}' ({:?}) belongs",
                self.schema.name, name, kind, field.name, field.kind
            )));
        }
        self.next_field += 1;
        Ok((field.since <= self.version).then_some(field))
    }

    /// File offset of the next unread byte
    fn position(&self) -> u64 {
        self.base + self.consumed() as u64
    }

    fn need(&self, bytes: usize) -> Result<()> {
        if self.buf.remaining() < bytes {
            return Err(StorageError::Truncated(self.position()));
        }
        Ok(())
    }

    pub fn u8(&mut self, name: &str) -> Result<u8> {
        if self.field(name, FieldKind::U8)?.is_none() {
            return Ok(self.default_of() as u8);
        }
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn u16(&mut self, name: &str) -> Result<u16> {
        if self.field(name, FieldKind::U16)?.is_none() {
            return Ok(self.default_of() as u16);
        }
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn u32(&mut self, name: &str) -> Result<u32> {
        if self.field(name, FieldKind::U32)?.is_none() {
            return Ok(self.default_of() as u32);
        }
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn u64(&mut self, name: &str) -> Result<u64> {
        if self.field(name, FieldKind::U64)?.is_none() {
            return Ok(self.default_of());
        }
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn string(&mut self, name: &str) -> Result<String> {
        if self.field(name, FieldKind::Str)?.is_none() {
            return Ok(String::new());
        }
        self.raw_string()
    }

    pub fn table(&mut self, name: &str) -> Result<BTreeMap<String, String>> {
        let mut table = BTreeMap::new();
        if self.field(name, FieldKind::Table)?.is_none() {
            return Ok(table);
        }
        self.need(8)?;
        let at = self.position();
        let count = self.buf.get_u64_le();
        if count > MAX_TABLE_ENTRIES {
            return Err(StorageError::Corrupt(at));
        }
        for _ in 0..count {
            let key = self.raw_string()?;
            let value = self.raw_string()?;
            table.insert(key, value);
        }
        Ok(table)
    }

    fn raw_string(&mut self) -> Result<String> {
        self.need(4)?;
        let at = self.position();
        let len = self.buf.get_u32_le() as usize;
        if len > MAX_STRING_LEN {
            return Err(StorageError::Corrupt(at));
        }
        self.need(len)?;
        let value = String::from_utf8_lossy(&self.buf[..len]).into_owned();
        self.buf.advance(len);
        Ok(value)
    }

    /// Default of the field just visited
    fn default_of(&self) -> u64 {
        self.schema.fields[self.next_field - 1].default
    }
}

/// Sequential field writer (always the current layout)
pub struct RecordWriter<'a> {
    schema: &'static Schema,
    buf: &'a mut Vec<u8>,
    next_field: usize,
}

impl<'a> RecordWriter<'a> {
    pub fn new(schema: &'static Schema, buf: &'a mut Vec<u8>) -> Self {
        Self {
            schema,
            buf,
            next_field: 0,
        }
    }

    /// Fields must be written in declaration order, none skipped
    fn field(&mut self, name: &str, kind: FieldKind) -> Result<()> {
        let expected = self.schema.fields.get(self.next_field).ok_or_else(|| {
            StorageError::Schema(format!("{}: extra field '{}'", self.schema.name, name))
        })?;
        if expected.name != name || expected.kind != kind {
            return Err(StorageError::Schema(format!(
                "{}: wrote '{}' where '{}' belongs",
                self.schema.name, name, expected.name
            )));
        }
        self.next_field += 1;
        Ok(())
    }

    pub fn u8(&mut self, name: &str, value: u8) -> Result<()> {
        self.field(name, FieldKind::U8)?;
        self.buf.put_u8(value);
        Ok(())
    }

    pub fn u16(&mut self, name: &str, value: u16) -> Result<()> {
        self.field(name, FieldKind::U16)?;
        self.buf.put_u16_le(value);
        Ok(())
    }

    pub fn u32(&mut self, name: &str, value: u32) -> Result<()> {
        self.field(name, FieldKind::U32)?;
        self.buf.put_u32_le(value);
        Ok(())
    }

    pub fn u64(&mut self, name: &str, value: u64) -> Result<()> {
        self.field(name, FieldKind::U64)?;
        self.buf.put_u64_le(value);
        Ok(())
    }

    pub fn string(&mut self, name: &str, value: &str) -> Result<()> {
        self.field(name, FieldKind::Str)?;
        self.raw_string(value);
        Ok(())
    }

    pub fn table(&mut self, name: &str, value: &BTreeMap<String, String>) -> Result<()> {
        self.field(name, FieldKind::Table)?;
        self.buf.put_u64_le(value.len() as u64);
        for (key, value) in value {
            self.raw_string(key);
            self.raw_string(value);
        }
        Ok(())
    }

    fn raw_string(&mut self, value: &str) {
        self.buf.put_u32_le(value.len() as u32);
        self.buf.put_slice(value.as_bytes());
    }

    /// Fail unless every declared field was written
    pub fn finish(self) -> Result<()> {
        if self.next_field != self.schema.fields.len() {
            return Err(StorageError::Schema(format!(
                "{}: record ended after {} of {} fields",
                self.schema.name,
                self.next_field,
                self.schema.fields.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static TEST_FIELDS: [Field; 4] = [
        Field::new("flags", FieldKind::U16, 0),
        Field::new("id", FieldKind::U64, 0),
        Field::new("prefix", FieldKind::U8, 2).with_default(32),
        Field::new("name", FieldKind::Str, 1),
    ];

    static TEST_SCHEMA: Schema = Schema {
        name: "test",
        current: 2,
        oldest: 0,
        fields: &TEST_FIELDS,
    };

    #[test]
    fn test_fixed_offsets() {
        assert_eq!(TEST_SCHEMA.fixed_offset("flags", 2), Some(0));
        assert_eq!(TEST_SCHEMA.fixed_offset("id", 2), Some(2));
        assert_eq!(TEST_SCHEMA.fixed_offset("prefix", 2), Some(10));
        assert_eq!(TEST_SCHEMA.fixed_offset("prefix", 1), None);
        assert_eq!(TEST_SCHEMA.fixed_offset("missing", 2), None);
        assert!(TEST_SCHEMA.has_field("name", 1));
        assert!(!TEST_SCHEMA.has_field("name", 0));
    }

    #[test]
    fn test_old_version_reads_defaults() {
        let mut data = Vec::new();
        data.put_u16_le(7);
        data.put_u64_le(42);

        let mut reader = RecordReader::new(&TEST_SCHEMA, 0, &data, 0);
        assert_eq!(reader.u16("flags").unwrap(), 7);
        assert_eq!(reader.u64("id").unwrap(), 42);
        assert_eq!(reader.u8("prefix").unwrap(), 32);
        assert_eq!(reader.string("name").unwrap(), "");
        assert_eq!(reader.consumed(), 10);
    }

    #[test]
    fn test_writer_enforces_layout() {
        let mut buf = Vec::new();
        let mut writer = RecordWriter::new(&TEST_SCHEMA, &mut buf);
        writer.u16("flags", 1).unwrap();
        assert!(writer.u8("prefix", 1).is_err());

        let mut buf = Vec::new();
        let mut writer = RecordWriter::new(&TEST_SCHEMA, &mut buf);
        writer.u16("flags", 1).unwrap();
        writer.u64("id", 2).unwrap();
        writer.u8("prefix", 24).unwrap();
        writer.string("name", "Alice").unwrap();
        writer.finish().unwrap();
        assert_eq!(buf.len(), 2 + 8 + 1 + 4 + 5);

        let mut reader = RecordReader::new(&TEST_SCHEMA, 2, &buf, 0);
        reader.u16("flags").unwrap();
        reader.u64("id").unwrap();
        assert_eq!(reader.u8("prefix").unwrap(), 24);
        assert_eq!(reader.string("name").unwrap(), "Alice");
    }

    #[test]
    fn test_truncated_string() {
        let mut data = Vec::new();
        data.put_u16_le(0);
        data.put_u64_le(1);
        data.put_u8(32);
        data.put_u32_le(100);
        data.put_slice(b"short");

        let mut reader = RecordReader::new(&TEST_SCHEMA, 2, &data, 1);
        reader.u16("flags").unwrap();
        reader.u64("id").unwrap();
        reader.u8("prefix").unwrap();
        assert!(matches!(reader.string("name"), Err(StorageError::Truncated(_))));
    }

    #[test]
    fn test_absurd_length_is_corrupt() {
        let mut data = Vec::new();
        data.put_u16_le(0);
        data.put_u64_le(1);
        data.put_u8(32);
        data.put_u32_le(u32::MAX);
        data.put_slice(b"name");

        let mut reader = RecordReader::new(&TEST_SCHEMA, 2, &data, 1);
        reader.u16("flags").unwrap();
        reader.u64("id").unwrap();
        reader.u8("prefix").unwrap();
        // Offset of the length prefix: header + 2 + 8 + 1
        assert!(matches!(reader.string("name"), Err(StorageError::Corrupt(12))));
    }
}
