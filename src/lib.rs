pub mod archive;
pub mod codec;
pub mod directory;
pub mod entry;
pub mod error;
pub mod header;
pub mod pack_io;

pub use codec::{Level, Method};
pub use directory::DirectoryRecord;
pub use entry::{ArchivedEntry, LogicalFile, SourceEntry};
pub use error::{Error, Result};
pub use header::Header;
pub use pack_io::{PackOptions, PackReader, PackWriter};
