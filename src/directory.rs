//! The package directory: one fixed-width record per entry.
//!
//! Each record is 280 bytes: a 256-byte NUL-terminated UTF-8 name followed
//! by six little-endian u32 fields.  The directory blob (all records
//! concatenated in insertion order) is compressed as a whole and written to
//! the main part behind a 4-byte record count; see the writer for framing.
//!
//! `uncompressed_size` is stored as zero when the flags encode "stored" —
//! `stored_size` is authoritative for such entries.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use crate::error::{Error, Result};

/// Fixed name field width, including the terminating NUL.
pub const NAME_LEN: usize = 256;
/// Serialized record length in bytes.
pub const RECORD_SIZE: usize = NAME_LEN + 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Archive-relative name, `/`-separated.
    pub name: String,
    /// Byte offset of the stored payload within its part.
    pub offset: u32,
    /// Bytes actually stored on disk (post-compression, pre-padding).
    pub stored_size: u32,
    /// Logical size; zero when the entry is stored uncompressed.
    pub uncompressed_size: u32,
    /// 0-based part ordinal; 0 is the main part.
    pub part_index: u32,
    /// Packed method/level byte (low byte; high bytes are zero).
    pub flags: u32,
    /// CRC-32 over the stored bytes.
    pub crc32: u32,
}

impl DirectoryRecord {
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        let name_bytes = self.name.as_bytes();
        if name_bytes.len() >= NAME_LEN {
            return Err(Error::NameTooLong(self.name.clone()));
        }
        let mut name_field = [0u8; NAME_LEN];
        name_field[..name_bytes.len()].copy_from_slice(name_bytes);
        writer.write_all(&name_field)?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.stored_size)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        writer.write_u32::<LittleEndian>(self.part_index)?;
        writer.write_u32::<LittleEndian>(self.flags)?;
        writer.write_u32::<LittleEndian>(self.crc32)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let mut name_field = [0u8; NAME_LEN];
        reader.read_exact(&mut name_field)?;
        let nul = name_field
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        let name = std::str::from_utf8(&name_field[..nul])
            .map_err(|_| {
                Error::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "directory record name is not valid UTF-8",
                ))
            })?
            .to_owned();
        Ok(Self {
            name,
            offset: reader.read_u32::<LittleEndian>()?,
            stored_size: reader.read_u32::<LittleEndian>()?,
            uncompressed_size: reader.read_u32::<LittleEndian>()?,
            part_index: reader.read_u32::<LittleEndian>()?,
            flags: reader.read_u32::<LittleEndian>()?,
            crc32: reader.read_u32::<LittleEndian>()?,
        })
    }
}
