//! Per-entry compression codecs and the packed flags byte.
//!
//! # Flags layout
//! One byte per entry, stored as the low byte of the directory record's
//! `flags` field:
//!   - bits 0–3: compression method (0 = stored, 1 = zlib, 2 = lz4)
//!   - bits 4–6: compression level (0 = default, 1 = fast)
//!   - bit 7:    always zero on write, MUST be zero on read
//!
//! Any other method or level value is a malformed entry; readers fail hard
//! rather than guess.
//!
//! # Exact-size decoding
//! `decode` always knows the logical size from the directory and enforces it:
//! a payload that decompresses to any other length is a format error for that
//! entry, surfaced as [`CodecError::SizeMismatch`].

use std::io::{self, Read, Write};
use thiserror::Error;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

// ── Method / Level ───────────────────────────────────────────────────────────

/// Compression method for a single entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// Payload stored verbatim.
    None,
    /// Deflate family (zlib wrapper).
    Zlib,
    /// LZ4 raw block.
    Lz4,
}

impl Method {
    pub fn name(self) -> &'static str {
        match self {
            Method::None => "none",
            Method::Zlib => "zlib",
            Method::Lz4  => "lz4",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Method::None),
            "zlib" => Some(Method::Zlib),
            "lz4"  => Some(Method::Lz4),
            _      => None,
        }
    }

    fn to_nibble(self) -> u8 {
        match self {
            Method::None => 0,
            Method::Zlib => 1,
            Method::Lz4  => 2,
        }
    }
}

/// Compression effort. `Fast` trades ratio for speed; `Default` is the
/// higher-effort setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Default,
    Fast,
}

impl Level {
    pub fn name(self) -> &'static str {
        match self {
            Level::Default => "default",
            Level::Fast    => "fast",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "default" => Some(Level::Default),
            "fast"    => Some(Level::Fast),
            _         => None,
        }
    }
}

// ── Flags byte ───────────────────────────────────────────────────────────────

/// Pack method and level into the on-disk flags byte.
pub fn pack_flags(method: Method, level: Level) -> u8 {
    let lvl = match level {
        Level::Default => 0u8,
        Level::Fast    => 1u8,
    };
    method.to_nibble() | (lvl << 4)
}

/// Unpack and validate an on-disk flags byte.
///
/// Rejects unknown method nibbles, unknown level values, and any set bit
/// at or above bit 7.
pub fn unpack_flags(flags: u8) -> Result<(Method, Level), CodecError> {
    if flags & !0x7F != 0 {
        return Err(CodecError::UnsupportedFlags(flags));
    }
    let method = match flags & 0x0F {
        0 => Method::None,
        1 => Method::Zlib,
        2 => Method::Lz4,
        _ => return Err(CodecError::UnsupportedFlags(flags)),
    };
    let level = match (flags >> 4) & 0x07 {
        0 => Level::Default,
        1 => Level::Fast,
        _ => return Err(CodecError::UnsupportedFlags(flags)),
    };
    Ok((method, level))
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unsupported entry flags {0:#04x}")]
    UnsupportedFlags(u8),
    #[error("decoded size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("compression failed: {0}")]
    Compression(String),
    #[error("decompression failed: {0}")]
    Decompression(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Encode / decode ──────────────────────────────────────────────────────────

/// Compress `data` with the given method and level.
///
/// `Method::None` returns the input unchanged. Empty input encodes to an
/// empty payload for every method.
pub fn encode(data: &[u8], method: Method, level: Level) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }
    match method {
        Method::None => Ok(data.to_vec()),
        Method::Zlib => {
            let compression = match level {
                Level::Fast    => Compression::fast(),
                Level::Default => Compression::default(),
            };
            let mut encoder = ZlibEncoder::new(Vec::new(), compression);
            encoder
                .write_all(data)
                .map_err(|e| CodecError::Compression(e.to_string()))?;
            encoder
                .finish()
                .map_err(|e| CodecError::Compression(e.to_string()))
        }
        // lz4_flex exposes a single effort setting; both levels map to it.
        // The level bit is still recorded in flags for the on-disk format.
        Method::Lz4 => Ok(lz4_flex::compress(data)),
    }
}

/// Decompress `data` into exactly `expected_len` bytes, dispatching on the
/// entry's flags byte.
pub fn decode(data: &[u8], expected_len: usize, flags: u8) -> Result<Vec<u8>, CodecError> {
    let (method, _level) = unpack_flags(flags)?;
    if expected_len == 0 {
        if data.is_empty() {
            return Ok(Vec::new());
        }
        return Err(CodecError::SizeMismatch {
            expected: 0,
            actual: data.len(),
        });
    }
    let out = match method {
        Method::None => data.to_vec(),
        Method::Zlib => {
            let mut decoder = ZlibDecoder::new(data);
            let mut out = Vec::with_capacity(expected_len);
            decoder
                .read_to_end(&mut out)
                .map_err(|e| CodecError::Decompression(e.to_string()))?;
            out
        }
        Method::Lz4 => lz4_flex::decompress(data, expected_len)
            .map_err(|e| CodecError::Decompression(e.to_string()))?,
    };
    if out.len() != expected_len {
        return Err(CodecError::SizeMismatch {
            expected: expected_len,
            actual: out.len(),
        });
    }
    Ok(out)
}

// ── Tests ────────────────────────────────────────────────────────────────────
