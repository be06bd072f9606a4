//! Package writer and reader engine.
//!
//! # Writer
//! [`PackWriter`] streams one logical file at a time through the codec into
//! the current part, padding the part to a 64-byte boundary after every
//! entry.  When a file's worst-case (uncompressed) size would push the
//! current part past the size limit, a fresh part file is opened and becomes
//! current.  `finalize` serializes the directory records in insertion order,
//! compresses the blob with the LZ4 directory codec, and emits
//! count + directory + header + trailer into the main part.
//!
//! # Reader
//! [`PackReader`] works from the end of the main part inward: trailer first
//! (signature check before anything else), then the header, then the
//! secondary parts named by the part convention, then the compressed
//! directory.  Entries come out bound to their backing part in directory
//! order.
//!
//! # Part naming
//! Given main path `D/S.E`, part `k ≥ 1` is `D/S_k.E`; part 0 is the main
//! path itself.  Secondary parts hold file data only — no directory, header,
//! or trailer.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use crc32fast::Hasher;
use tracing::{debug, trace};

use crate::codec::{self, pack_flags, CodecError, Level, Method};
use crate::directory::{DirectoryRecord, RECORD_SIZE};
use crate::entry::{ArchivedEntry, LogicalFile};
use crate::error::{Error, Result};
use crate::header::{self, Header};

/// Every entry starts at a multiple of this within its part.
pub const ALIGN: u64 = 64;
/// Filler byte for alignment padding.
pub const PAD_BYTE: u8 = 0xAD;
/// Default per-part worst-case content bound: 1 GiB.
pub const MAX_PART_SIZE: u64 = 0x4000_0000;

/// The directory blob is always compressed this way, independent of any
/// per-file settings.
const DIRECTORY_METHOD: Method = Method::Lz4;
const DIRECTORY_LEVEL: Level = Level::Default;

/// Path of part `index` for the package at `main`.
pub fn part_path(main: &Path, index: usize) -> PathBuf {
    if index == 0 {
        return main.to_owned();
    }
    let mut name = OsString::from(main.file_stem().unwrap_or_default());
    name.push(format!("_{index}"));
    if let Some(ext) = main.extension() {
        name.push(".");
        name.push(ext);
    }
    main.with_file_name(name)
}

// ── Options ──────────────────────────────────────────────────────────────────

/// Configuration for [`PackWriter::create`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    pub method: Method,
    pub level: Level,
    /// Worst-case content bound per part.  The default is [`MAX_PART_SIZE`].
    pub part_size_limit: u64,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            method: Method::Lz4,
            level: Level::Default,
            part_size_limit: MAX_PART_SIZE,
        }
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct PackWriter {
    main_path: PathBuf,
    parts: Vec<File>,
    current: usize,
    method: Method,
    level: Level,
    part_size_limit: u64,
    finalized: bool,
}

impl PackWriter {
    pub fn create<P: AsRef<Path>>(path: P, opts: PackOptions) -> Result<Self> {
        let main_path = path.as_ref().to_owned();
        let main = File::create(&main_path)?;
        Ok(Self {
            main_path,
            parts: vec![main],
            current: 0,
            method: opts.method,
            level: opts.level,
            part_size_limit: opts.part_size_limit,
            finalized: false,
        })
    }

    /// Number of part streams opened so far (≥ 1).
    pub fn num_parts(&self) -> usize {
        self.parts.len()
    }

    /// Compress one logical file with the writer's configured method and
    /// level; see [`write_entry_with`](Self::write_entry_with).
    pub fn write_entry(&mut self, input: &dyn LogicalFile) -> Result<DirectoryRecord> {
        self.write_entry_with(input, self.method, self.level)
    }

    /// Compress one logical file into the current part and return the
    /// directory record describing where it landed.
    pub fn write_entry_with(
        &mut self,
        input: &dyn LogicalFile,
        method: Method,
        level: Level,
    ) -> Result<DirectoryRecord> {
        if self.finalized || self.parts.is_empty() {
            return Err(writer_closed());
        }

        let mut data = Vec::with_capacity(input.size() as usize);
        input.open_reader()?.read_to_end(&mut data)?;

        // Roll over on the worst-case (uncompressed) length so a part never
        // needs retroactive resizing.  An oversized file on a fresh part is
        // written anyway rather than looping forever.
        let position = self.parts[self.current].stream_position()?;
        if position > 0 && position + data.len() as u64 > self.part_size_limit {
            let path = part_path(&self.main_path, self.parts.len());
            debug!(part = self.parts.len(), path = %path.display(), "part limit reached, opening next part");
            self.parts.push(File::create(path)?);
            self.current = self.parts.len() - 1;
        }

        let encoded = codec::encode(&data, method, level)?;

        let part = &mut self.parts[self.current];
        let offset = part_offset(part.stream_position()?)?;
        part.write_all(&encoded)?;

        // Pad to the next 64-byte boundary; the filler is never described by
        // any record.
        let end = part.stream_position()?;
        let fill = (ALIGN - end % ALIGN) % ALIGN;
        if fill > 0 {
            part.write_all(&vec![PAD_BYTE; fill as usize])?;
        }

        let mut hasher = Hasher::new();
        hasher.update(&encoded);
        let crc32 = hasher.finalize();

        trace!(
            name = input.name(),
            part = self.current,
            offset,
            stored = encoded.len(),
            logical = data.len(),
            "wrote entry"
        );

        Ok(DirectoryRecord {
            name: input.name().to_owned(),
            offset,
            stored_size: encoded.len() as u32,
            // A stored entry's logical size is its on-disk size; the field
            // stays zero on disk in that case.
            uncompressed_size: match method {
                Method::None => 0,
                _ => data.len() as u32,
            },
            part_index: self.current as u32,
            flags: pack_flags(method, level) as u32,
            crc32,
        })
    }

    /// Write the compressed directory, header, and trailer to the main part.
    /// Must be called exactly once, with the records in insertion order.
    pub fn finalize(&mut self, records: &[DirectoryRecord]) -> Result<Header> {
        if self.finalized || self.parts.is_empty() {
            return Err(writer_closed());
        }

        let mut blob = Vec::with_capacity(records.len() * RECORD_SIZE);
        for record in records {
            record.write(&mut blob)?;
        }
        let packed = codec::encode(&blob, DIRECTORY_METHOD, DIRECTORY_LEVEL)?;

        let num_parts = self.parts.len() as u16;
        let main = &mut self.parts[0];
        let file_list_offset = part_offset(main.stream_position()?)?;
        main.write_u32::<LittleEndian>(records.len() as u32)?;
        main.write_all(&packed)?;

        let header = Header::new(file_list_offset, (4 + packed.len()) as u32, num_parts);
        header.write(&mut *main)?;
        header::write_trailer(&mut *main)?;
        for part in &mut self.parts {
            part.flush()?;
        }

        debug!(
            entries = records.len(),
            parts = self.parts.len(),
            directory_bytes = packed.len(),
            archive_id = %header.archive_id,
            "finalized package"
        );
        self.finalized = true;
        Ok(header)
    }

    /// Release all part streams.  Idempotent; safe after `finalize`.
    pub fn close(&mut self) {
        self.parts.clear();
    }
}

fn part_offset(position: u64) -> Result<u32> {
    u32::try_from(position).map_err(|_| {
        Error::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            "part grew past the 4 GiB offset space",
        ))
    })
}

fn writer_closed() -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::Other,
        "package writer is already finalized",
    ))
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct PackReader {
    parts: Vec<Rc<RefCell<File>>>,
    pub header: Header,
    /// Entries in directory (insertion) order.
    pub entries: Vec<ArchivedEntry>,
}

impl PackReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut main = File::open(path)?;

        // Trailer first: a bad signature aborts before any parsing.
        header::seek_to_header(&mut main)?;
        let hdr = Header::read(&mut main)?;
        debug!(
            parts = hdr.num_parts,
            archive_id = %hdr.archive_id,
            "opened package header"
        );

        let mut parts = Vec::with_capacity(hdr.num_parts as usize);
        parts.push(Rc::new(RefCell::new(main)));
        for index in 1..hdr.num_parts as usize {
            let part = part_path(path, index);
            let file = File::open(&part).map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    Error::MissingPart(part.clone())
                } else {
                    Error::Io(e)
                }
            })?;
            parts.push(Rc::new(RefCell::new(file)));
        }

        let records = read_directory(&parts[0], &hdr)?;
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            entries.push(ArchivedEntry::from_record(record, &parts)?);
        }

        Ok(Self {
            parts,
            header: hdr,
            entries,
        })
    }

    /// Release all part streams.  Entries keep their own handle clones, so
    /// any still alive remain readable; a closed reader holds nothing.
    pub fn close(&mut self) {
        self.entries.clear();
        self.parts.clear();
    }
}

/// Read and decompress the directory from the main part.
fn read_directory(main: &Rc<RefCell<File>>, hdr: &Header) -> Result<Vec<DirectoryRecord>> {
    if (hdr.file_list_size as usize) < 4 {
        return Err(Error::DirectoryCorrupt {
            expected: 4,
            actual: hdr.file_list_size as usize,
        });
    }

    let mut guard = main.borrow_mut();
    let main: &mut File = &mut guard;
    main.seek(SeekFrom::Start(hdr.file_list_offset as u64))?;
    let count = main.read_u32::<LittleEndian>()? as usize;

    let packed_len = hdr.file_list_size as usize - 4;
    let mut packed = Vec::with_capacity(packed_len);
    let actual = Read::by_ref(main)
        .take(packed_len as u64)
        .read_to_end(&mut packed)?;
    if actual != packed_len {
        return Err(Error::ShortRead {
            requested: packed_len,
            actual,
        });
    }
    drop(guard);

    // A count implying more records than the codec could ever have packed
    // into the blob (LZ4 tops out below 256:1) is corrupt; reject it before
    // sizing the decode buffer.
    let expected = count.saturating_mul(RECORD_SIZE);
    if expected > packed_len.saturating_mul(256) {
        return Err(Error::DirectoryCorrupt {
            expected,
            actual: packed_len,
        });
    }
    let blob = match codec::decode(
        &packed,
        expected,
        pack_flags(DIRECTORY_METHOD, DIRECTORY_LEVEL),
    ) {
        Ok(blob) => blob,
        Err(CodecError::SizeMismatch { expected, actual }) => {
            return Err(Error::DirectoryCorrupt { expected, actual })
        }
        Err(e) => return Err(e.into()),
    };

    let mut cursor = Cursor::new(blob);
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(DirectoryRecord::read(&mut cursor)?);
    }
    trace!(count, "decoded directory");
    Ok(records)
}

// ── Tests ────────────────────────────────────────────────────────────────────
