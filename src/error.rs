//! Crate-wide error type.
//!
//! Every failure is fatal for the operation that raised it: there is no
//! partial-package recovery and no retry.  Format and integrity violations
//! get their own variants so callers can tell a damaged package apart from
//! an ordinary filesystem failure.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::CodecError;

#[derive(Error, Debug)]
pub enum Error {
    /// The trailer signature at the end of the main part did not match.
    #[error("not a valid .mpk package: bad signature")]
    InvalidSignature,

    #[error("unsupported package version {found} (this build supports {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    /// A secondary part file named by the header could not be opened.
    #[error("package is incomplete: missing part file {0}")]
    MissingPart(PathBuf),

    /// A directory record points at a part the header never declared.
    #[error("part index {index} out of range (package has {parts} part(s))")]
    PartIndexOutOfRange { index: u32, parts: u16 },

    /// The directory blob did not match `record_count * RECORD_SIZE`.
    #[error("directory corrupt: expected {expected} bytes, got {actual}")]
    DirectoryCorrupt { expected: usize, actual: usize },

    #[error("checksum mismatch in '{name}': expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("short read from part: requested {requested} bytes, got {actual}")]
    ShortRead { requested: usize, actual: usize },

    /// A source entry has no checksum until the writer has stored it.
    #[error("checksum is not available before the entry is written")]
    ChecksumUnavailable,

    #[error("entry name '{0}' exceeds 255 bytes")]
    NameTooLong(String),

    #[error("file {0} exceeds the 4 GiB per-entry limit")]
    FileTooLarge(PathBuf),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
