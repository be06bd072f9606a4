//! Logical files: the uniform capability the writer consumes and the reader
//! produces.
//!
//! Exactly two shapes exist.  [`SourceEntry`] is backed by a filesystem path
//! and feeds the writer; [`ArchivedEntry`] is backed by an already-written
//! part stream and comes out of the reader.  Entries share their part handle
//! with the reader through `Rc<RefCell<File>>` — the whole pipeline is
//! single-threaded, so interior mutability is all the coordination needed.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use crc32fast::Hasher;
use tracing::trace;

use crate::codec::{self, unpack_flags, CodecError, Method};
use crate::directory::DirectoryRecord;
use crate::error::{Error, Result};

/// The capability every package entry exposes: a name, a logical size, a
/// checksum over the stored bytes, and an on-demand byte stream.
pub trait LogicalFile {
    fn name(&self) -> &str;
    /// Logical (extracted) size in bytes.
    fn size(&self) -> u32;
    /// CRC-32 over the bytes as stored on disk.  Unavailable for entries
    /// that have not been written yet.
    fn checksum(&self) -> Result<u32>;
    /// Open a reader over the logical content.
    fn open_reader(&self) -> Result<Box<dyn Read>>;
}

// ── ArchivedEntry ────────────────────────────────────────────────────────────

/// An entry bound to one part of an opened package.
pub struct ArchivedEntry {
    name: String,
    offset: u32,
    stored_size: u32,
    uncompressed_size: u32,
    part_index: u32,
    flags: u8,
    method: Method,
    crc32: u32,
    part: Rc<RefCell<File>>,
}

impl ArchivedEntry {
    /// Bind a directory record to its backing part stream.
    ///
    /// Fails on malformed flags and on a `part_index` the package header
    /// never declared.
    pub(crate) fn from_record(
        record: DirectoryRecord,
        parts: &[Rc<RefCell<File>>],
    ) -> Result<Self> {
        if record.flags & !0x7F != 0 {
            return Err(Error::Codec(CodecError::UnsupportedFlags(
                (record.flags & 0xFF) as u8,
            )));
        }
        let flags = record.flags as u8;
        let (method, _level) = unpack_flags(flags)?;
        let part = parts
            .get(record.part_index as usize)
            .ok_or(Error::PartIndexOutOfRange {
                index: record.part_index,
                parts: parts.len() as u16,
            })?
            .clone();
        Ok(Self {
            name: record.name,
            offset: record.offset,
            stored_size: record.stored_size,
            uncompressed_size: record.uncompressed_size,
            part_index: record.part_index,
            flags,
            method,
            crc32: record.crc32,
            part,
        })
    }

    pub fn part_index(&self) -> u32 {
        self.part_index
    }

    pub fn stored_size(&self) -> u32 {
        self.stored_size
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Read the stored bytes and verify them against the directory checksum.
    fn read_stored(&self) -> Result<Vec<u8>> {
        let mut part = self.part.borrow_mut();
        part.seek(SeekFrom::Start(self.offset as u64))?;

        let requested = self.stored_size as usize;
        let mut stored = Vec::with_capacity(requested);
        let actual = part
            .by_ref()
            .take(requested as u64)
            .read_to_end(&mut stored)?;
        if actual != requested {
            return Err(Error::ShortRead { requested, actual });
        }

        let mut hasher = Hasher::new();
        hasher.update(&stored);
        let computed = hasher.finalize();
        if computed != self.crc32 {
            return Err(Error::ChecksumMismatch {
                name: self.name.clone(),
                expected: self.crc32,
                actual: computed,
            });
        }
        trace!(name = %self.name, bytes = requested, "verified stored entry");
        Ok(stored)
    }
}

impl LogicalFile for ArchivedEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u32 {
        // A stored entry keeps uncompressed_size at zero in the directory;
        // its on-disk size is the logical size.
        match self.method {
            Method::None => self.stored_size,
            _ => self.uncompressed_size,
        }
    }

    fn checksum(&self) -> Result<u32> {
        Ok(self.crc32)
    }

    fn open_reader(&self) -> Result<Box<dyn Read>> {
        let stored = self.read_stored()?;
        let logical = codec::decode(&stored, self.size() as usize, self.flags)?;
        Ok(Box::new(Cursor::new(logical)))
    }
}

// ── SourceEntry ──────────────────────────────────────────────────────────────

/// A writer input backed by a filesystem path.  The checksum does not exist
/// until the writer has compressed and stored the bytes.
pub struct SourceEntry {
    name: String,
    path: PathBuf,
    len: u32,
}

impl SourceEntry {
    /// `name` is the archive-relative name the entry will carry.
    pub fn new<P: AsRef<Path>>(path: P, name: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let len = std::fs::metadata(&path)?.len();
        let len = u32::try_from(len).map_err(|_| Error::FileTooLarge(path.clone()))?;
        Ok(Self {
            name: name.into(),
            path,
            len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogicalFile for SourceEntry {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u32 {
        self.len
    }

    fn checksum(&self) -> Result<u32> {
        Err(Error::ChecksumUnavailable)
    }

    fn open_reader(&self) -> Result<Box<dyn Read>> {
        Ok(Box::new(File::open(&self.path)?))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
