//! Fixed-layout package header and the trailer that locates it.
//!
//! The header is not at a fixed offset: the last 8 bytes of the main part
//! form a trailer — `u32 header_size` (header plus trailer) followed by the
//! 4-byte signature.  A reader seeks to `end - 8`, validates the signature,
//! then seeks to `end - header_size` to find the header start.  This keeps
//! the header self-describing without pinning its size.
//!
//! All fields are little-endian.  `archive_id` is a random 128-bit value
//! generated fresh per write; it is carried for diagnostics and never
//! validated on read.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Trailer signature identifying the format family.
pub const SIGNATURE: &[u8; 4] = b"MPK!";
/// The one container version this build reads and writes.
pub const VERSION: u32 = 1;

/// Serialized header length in bytes.
pub const HEADER_SIZE: usize = 32;
/// Trailer length: `header_size` field + signature.
pub const TRAILER_SIZE: usize = 8;

#[derive(Debug, Clone)]
pub struct Header {
    pub version: u32,
    /// Byte offset of the compressed directory within the main part.
    pub file_list_offset: u32,
    /// Length of the record-count field plus the compressed directory bytes.
    pub file_list_size: u32,
    pub num_parts: u16,
    /// Written as zero, ignored on read.
    pub reserved: u16,
    pub archive_id: Uuid,
}

impl Header {
    pub fn new(file_list_offset: u32, file_list_size: u32, num_parts: u16) -> Self {
        Self {
            version: VERSION,
            file_list_offset,
            file_list_size,
            num_parts,
            reserved: 0,
            archive_id: Uuid::new_v4(),
        }
    }

    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.file_list_offset)?;
        writer.write_u32::<LittleEndian>(self.file_list_size)?;
        writer.write_u16::<LittleEndian>(self.num_parts)?;
        writer.write_u16::<LittleEndian>(self.reserved)?;
        writer.write_all(self.archive_id.as_bytes())?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let version = reader.read_u32::<LittleEndian>()?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion {
                found: version,
                supported: VERSION,
            });
        }
        let file_list_offset = reader.read_u32::<LittleEndian>()?;
        let file_list_size = reader.read_u32::<LittleEndian>()?;
        let num_parts = reader.read_u16::<LittleEndian>()?;
        let reserved = reader.read_u16::<LittleEndian>()?;
        let mut id_bytes = [0u8; 16];
        reader.read_exact(&mut id_bytes)?;
        Ok(Self {
            version,
            file_list_offset,
            file_list_size,
            num_parts,
            reserved,
            archive_id: Uuid::from_bytes(id_bytes),
        })
    }
}

/// Append the 8-byte trailer after a freshly written header.
pub fn write_trailer<W: Write>(mut writer: W) -> Result<()> {
    writer.write_u32::<LittleEndian>((HEADER_SIZE + TRAILER_SIZE) as u32)?;
    writer.write_all(SIGNATURE)?;
    Ok(())
}

/// Validate the trailer at the end of the stream and position the stream at
/// the header start.
///
/// A bad signature aborts before any header parsing is attempted.
pub fn seek_to_header<R: Read + Seek>(mut reader: R) -> Result<()> {
    reader.seek(SeekFrom::End(-(TRAILER_SIZE as i64)))?;
    let header_size = reader.read_u32::<LittleEndian>()?;
    let mut sig = [0u8; 4];
    reader.read_exact(&mut sig)?;
    if &sig != SIGNATURE {
        return Err(Error::InvalidSignature);
    }
    reader.seek(SeekFrom::End(-(header_size as i64)))?;
    Ok(())
}
