//! # Versioned File Engine
//!
//! Shared by every store:
//!
//! ```text
//! [u8 version][record][record]...
//! ```
//!
//! # Open
//! 1. Missing or empty file: create it with the current header
//! 2. Header outside the supported range: archive to `<file>.<unix>.bak`
//!    and start empty
//! 3. Stream records until EOF; a torn trailing record is cut off. A
//!    damaged record elsewhere archives the file first and keeps only the
//!    records before it
//! 4. Header older than current: rewrite the whole file in the current
//!    layout before any further write
//!
//! # Writes
//! The file is reopened for every write and closed afterwards. Appends seek
//! to the tracked end-of-file cursor rather than asking the OS for it.

use crate::error::{Result, StorageError};
use crate::schema::{Record, RecordReader, RecordWriter};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// Header length
const HEADER_LEN: u64 = 1;

/// What happened while opening a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// No file (or an empty one); a fresh header was written
    Created,

    /// Current version, read as-is
    Loaded,

    /// Older version, rewritten in the current layout
    Upgraded { from: u8 },

    /// Unreadable or unsupported; the old file was moved aside
    Reset { backup: PathBuf, reason: String },

    /// A damaged record was found; the records before it were kept and the
    /// original file was moved aside
    Salvaged { backup: PathBuf, reason: String },

    /// A torn trailing record was cut off at `at`
    Truncated { at: u64 },
}

/// One versioned record file
///
/// # Purpose
/// Tracks where every record starts so callers can patch fixed-width fields
/// in place, and where the file ends so appends need no seek-to-end.
#[derive(Debug)]
pub struct VersionedFile<R: Record> {
    path: PathBuf,
    eof: u64,
    offsets: Vec<u64>,
    _record: PhantomData<R>,
}

/// Encode one record in the current layout
pub fn encode<R: Record>(record: &R) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let mut writer = RecordWriter::new(R::SCHEMA, &mut buf);
    record.write(&mut writer)?;
    writer.finish()?;
    Ok(buf)
}

/// Where decoding stopped early
#[derive(Debug)]
enum DecodeStop {
    /// The last record runs past EOF (an interrupted append)
    Torn(u64),

    /// A record could not be read; everything from it on is suspect
    Corrupt(u64, StorageError),
}

/// Decode every record of `data` (the bytes after the header)
///
/// # Returns
/// The records, their offsets in the file, and where decoding stopped if it
/// did not reach the end
fn decode_all<R: Record>(version: u8, data: &[u8]) -> (Vec<R>, Vec<u64>, Option<DecodeStop>) {
    let mut records = Vec::new();
    let mut offsets = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let base = HEADER_LEN + pos as u64;
        let mut reader = RecordReader::new(R::SCHEMA, version, &data[pos..], base);
        match R::read(&mut reader) {
            Ok(record) => {
                offsets.push(base);
                records.push(record);
                pos += reader.consumed();
            }
            Err(StorageError::Truncated(_)) => return (records, offsets, Some(DecodeStop::Torn(base))),
            Err(e) => return (records, offsets, Some(DecodeStop::Corrupt(base, e))),
        }
    }

    (records, offsets, None)
}

impl<R: Record> VersionedFile<R> {
    /// Open (or create) a record file
    ///
    /// # Returns
    /// The file handle, every record in file order, and what was done to
    /// make the file usable
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, Vec<R>, OpenOutcome)> {
        let path = path.as_ref().to_path_buf();
        let schema = R::SCHEMA;

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let mut file = Self {
            path,
            eof: HEADER_LEN,
            offsets: Vec::new(),
            _record: PhantomData,
        };

        let Some((&version, body)) = data.split_first() else {
            tracing::info!("{}: creating {}", schema.name, file.path.display());
            file.rewrite(&[])?;
            return Ok((file, Vec::new(), OpenOutcome::Created));
        };

        if !schema.supports(version) {
            let reason = StorageError::UnsupportedVersion {
                found: version,
                oldest: schema.oldest,
                current: schema.current,
            }
            .to_string();
            let backup = file.archive()?;
            tracing::error!(
                "{}: {} in {}; moved to {} and starting empty",
                schema.name,
                reason,
                file.path.display(),
                backup.display()
            );
            file.rewrite(&[])?;
            return Ok((file, Vec::new(), OpenOutcome::Reset { backup, reason }));
        }

        let (records, offsets, stop) = decode_all::<R>(version, body);

        let torn = match stop {
            None => None,
            Some(DecodeStop::Torn(at)) => Some(at),
            Some(DecodeStop::Corrupt(at, e)) => {
                // Records past a bad one cannot be found again; keep the
                // readable prefix and move the original aside untouched
                let reason = format!("unreadable record at byte {}: {}", at, e);
                let backup = file.archive()?;
                tracing::error!(
                    "{}: {} in {}; kept {} records, original moved to {}",
                    schema.name,
                    reason,
                    file.path.display(),
                    records.len(),
                    backup.display()
                );
                file.rewrite(&records)?;
                return Ok((file, records, OpenOutcome::Salvaged { backup, reason }));
            }
        };

        if version < schema.current {
            if let Some(at) = torn {
                let backup = file.archive()?;
                tracing::warn!(
                    "{}: torn record at byte {} dropped during upgrade; original moved to {}",
                    schema.name,
                    at,
                    backup.display()
                );
            }
            tracing::info!(
                "{}: upgrading {} from version {} to {} ({} records)",
                schema.name,
                file.path.display(),
                version,
                schema.current,
                records.len()
            );
            file.rewrite(&records)?;
            return Ok((file, records, OpenOutcome::Upgraded { from: version }));
        }

        file.offsets = offsets;
        file.eof = HEADER_LEN + body.len() as u64;

        if let Some(at) = torn {
            let handle = OpenOptions::new().write(true).open(&file.path)?;
            handle.set_len(at)?;
            file.eof = at;
            tracing::warn!("{}: truncated {} to {} bytes", schema.name, file.path.display(), at);
            return Ok((file, records, OpenOutcome::Truncated { at }));
        }

        tracing::debug!("{}: loaded {} records from {}", schema.name, records.len(), file.path.display());
        Ok((file, records, OpenOutcome::Loaded))
    }

    /// Move the current file aside as `<file>.<unix time>.bak`
    fn archive(&self) -> Result<PathBuf> {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".{}.bak", rcon_core::unix_now()));
        let backup = PathBuf::from(name);
        fs::rename(&self.path, &backup)?;
        Ok(backup)
    }

    /// Append one record at the tracked end of file
    ///
    /// # Returns
    /// The byte offset the record was written at
    pub fn append(&mut self, record: &R) -> Result<u64> {
        let bytes = encode(record)?;
        let offset = self.eof;

        let mut handle = OpenOptions::new().write(true).open(&self.path)?;
        handle.seek(SeekFrom::Start(offset))?;
        handle.write_all(&bytes)?;
        drop(handle);

        self.eof += bytes.len() as u64;
        self.offsets.push(offset);
        Ok(offset)
    }

    /// Replace the whole file: current header plus `records` in order
    pub fn rewrite(&mut self, records: &[R]) -> Result<()> {
        let mut out = Vec::with_capacity(1 + records.len() * 64);
        out.push(R::SCHEMA.current);

        let mut offsets = Vec::with_capacity(records.len());
        for record in records {
            offsets.push(out.len() as u64);
            out.extend_from_slice(&encode(record)?);
        }

        let mut handle = File::create(&self.path)?;
        handle.write_all(&out)?;
        drop(handle);

        self.eof = out.len() as u64;
        self.offsets = offsets;
        Ok(())
    }

    /// Overwrite bytes in place
    ///
    /// # Errors
    /// `OutOfRange` when the write would reach past the tracked end of file
    /// or touch the header
    pub fn write_at(&mut self, offset: u64, bytes: &[u8]) -> Result<()> {
        if offset < HEADER_LEN || offset + bytes.len() as u64 > self.eof {
            return Err(StorageError::OutOfRange(offset as usize));
        }

        let mut handle = OpenOptions::new().write(true).open(&self.path)?;
        handle.seek(SeekFrom::Start(offset))?;
        handle.write_all(bytes)?;
        Ok(())
    }

    /// Byte offset of record `index`
    #[inline]
    pub fn offset_of(&self, index: usize) -> Option<u64> {
        self.offsets.get(index).copied()
    }

    /// Tracked end-of-file cursor
    #[inline]
    pub fn eof(&self) -> u64 {
        self.eof
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records on disk
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldKind, Schema};

    #[derive(Debug, Clone, PartialEq)]
    struct Note {
        id: u32,
        text: String,
    }

    const NOTE_FIELDS: [Field; 2] = [
        Field::new("id", FieldKind::U32, 0),
        Field::new("text", FieldKind::Str, 1),
    ];

    const NOTE_SCHEMA: Schema = Schema {
        name: "notes",
        current: 1,
        oldest: 0,
        fields: &NOTE_FIELDS,
    };

    impl Record for Note {
        const SCHEMA: &'static Schema = &NOTE_SCHEMA;

        fn read(reader: &mut RecordReader<'_>) -> Result<Self> {
            Ok(Self {
                id: reader.u32("id")?,
                text: reader.string("text")?,
            })
        }

        fn write(&self, writer: &mut RecordWriter<'_>) -> Result<()> {
            writer.u32("id", self.id)?;
            writer.string("text", &self.text)
        }
    }

    fn note(id: u32, text: &str) -> Note {
        Note { id, text: text.into() }
    }

    #[test]
    fn test_create_append_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");

        let (mut file, records, outcome) = VersionedFile::<Note>::open(&path).unwrap();
        assert!(records.is_empty());
        assert_eq!(outcome, OpenOutcome::Created);
        assert_eq!(fs::read(&path).unwrap(), vec![1]);

        assert_eq!(file.append(&note(1, "a")).unwrap(), 1);
        let second = file.append(&note(2, "bc")).unwrap();
        assert_eq!(second, 1 + 4 + 4 + 1);
        assert_eq!(file.eof(), fs::metadata(&path).unwrap().len());

        let (file, records, outcome) = VersionedFile::<Note>::open(&path).unwrap();
        assert_eq!(outcome, OpenOutcome::Loaded);
        assert_eq!(records, vec![note(1, "a"), note(2, "bc")]);
        assert_eq!(file.offset_of(1), Some(second));
    }

    #[test]
    fn test_upgrade_from_older_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        let mut old = vec![0u8];
        old.extend_from_slice(&7u32.to_le_bytes());
        old.extend_from_slice(&8u32.to_le_bytes());
        fs::write(&path, &old).unwrap();

        let (_, records, outcome) = VersionedFile::<Note>::open(&path).unwrap();
        assert_eq!(outcome, OpenOutcome::Upgraded { from: 0 });
        assert_eq!(records, vec![note(7, ""), note(8, "")]);

        let data = fs::read(&path).unwrap();
        assert_eq!(data[0], 1);
        assert_eq!(data.len(), 1 + 2 * (4 + 4));
    }

    #[test]
    fn test_newer_version_is_archived() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        fs::write(&path, [9u8, 1, 2, 3]).unwrap();

        let (_, records, outcome) = VersionedFile::<Note>::open(&path).unwrap();
        assert!(records.is_empty());
        let OpenOutcome::Reset { backup, .. } = outcome else {
            panic!("expected the file to be reset");
        };
        assert_eq!(fs::read(&backup).unwrap(), vec![9, 1, 2, 3]);
        assert_eq!(fs::read(&path).unwrap(), vec![1]);
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        {
            let (mut file, _, _) = VersionedFile::<Note>::open(&path).unwrap();
            file.append(&note(1, "whole")).unwrap();
        }
        let intact = fs::metadata(&path).unwrap().len();
        let mut data = fs::read(&path).unwrap();
        data.extend_from_slice(&[2, 0, 0, 0, 50, 0]);
        fs::write(&path, &data).unwrap();

        let (mut file, records, outcome) = VersionedFile::<Note>::open(&path).unwrap();
        assert_eq!(outcome, OpenOutcome::Truncated { at: intact });
        assert_eq!(records, vec![note(1, "whole")]);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact);

        file.append(&note(3, "next")).unwrap();
        let (_, records, _) = VersionedFile::<Note>::open(&path).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_write_at_bounds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        let (mut file, _, _) = VersionedFile::<Note>::open(&path).unwrap();
        let offset = file.append(&note(1, "x")).unwrap();

        file.write_at(offset, &5u32.to_le_bytes()).unwrap();
        assert!(file.write_at(0, &[1]).is_err());
        assert!(file.write_at(file.eof(), &[1]).is_err());

        let (_, records, _) = VersionedFile::<Note>::open(&path).unwrap();
        assert_eq!(records, vec![note(5, "x")]);
    }

    #[test]
    fn test_damaged_record_archives_before_dropping() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        {
            let (mut file, _, _) = VersionedFile::<Note>::open(&path).unwrap();
            file.append(&note(1, "first")).unwrap();
            file.append(&note(2, "second")).unwrap();
            file.append(&note(3, "third")).unwrap();
        }
        let mut data = fs::read(&path).unwrap();
        let original = data.clone();
        // Length prefix of the second record's text
        let second = 1 + 4 + 4 + 5;
        data[second + 4..second + 8].copy_from_slice(&u32::MAX.to_le_bytes());
        fs::write(&path, &data).unwrap();

        let (file, records, outcome) = VersionedFile::<Note>::open(&path).unwrap();
        assert_eq!(records, vec![note(1, "first")]);
        let OpenOutcome::Salvaged { backup, .. } = outcome else {
            panic!("expected the damaged file to be archived");
        };
        assert_eq!(fs::read(&backup).unwrap().len(), original.len());
        assert_eq!(file.len(), 1);

        let (_, reopened, outcome) = VersionedFile::<Note>::open(&path).unwrap();
        assert_eq!(outcome, OpenOutcome::Loaded);
        assert_eq!(reopened, vec![note(1, "first")]);
    }

    #[test]
    fn test_torn_tail_during_upgrade_is_archived() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        let mut old = vec![0u8];
        old.extend_from_slice(&7u32.to_le_bytes());
        old.extend_from_slice(&[8, 0]);
        fs::write(&path, &old).unwrap();

        let (_, records, outcome) = VersionedFile::<Note>::open(&path).unwrap();
        assert_eq!(outcome, OpenOutcome::Upgraded { from: 0 });
        assert_eq!(records, vec![note(7, "")]);

        let backups = fs::read_dir(dir.path())
            .unwrap()
            .filter(|entry| entry.as_ref().unwrap().path().extension().is_some_and(|e| e == "bak"))
            .count();
        assert_eq!(backups, 1);
    }
}
