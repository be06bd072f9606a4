//! High-level packing and extraction — the primary embedding surface.
//!
//! ```no_run
//! use mpak::archive;
//! use mpak::pack_io::PackOptions;
//! use std::path::Path;
//!
//! let inputs = archive::collect_inputs(Path::new("assets"))?;
//! let mut progress = |name: &str, _done: u64, _total: u64| eprintln!("packing {name}");
//! archive::pack(&inputs, Path::new("assets.mpk"), PackOptions::default(), &mut progress)?;
//! archive::extract_all(Path::new("assets.mpk"), Path::new("restored"), &mut progress)?;
//! # Ok::<(), mpak::Error>(())
//! ```

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::entry::{LogicalFile, SourceEntry};
use crate::error::Result;
use crate::header::Header;
use crate::pack_io::{PackOptions, PackReader, PackWriter};

/// Progress sink: `(entry name, bytes processed so far, total bytes)`.
/// Invoked synchronously once before each file; it must not block, there is
/// no concurrent progress channel.
pub type ProgressFn<'a> = &'a mut dyn FnMut(&str, u64, u64);

/// Enumerate a directory tree into writer inputs.
///
/// Traversal is depth-first with the files of each directory ordered before
/// its subdirectories; names are `/`-separated paths relative to `root`.
pub fn collect_inputs(root: &Path) -> Result<Vec<SourceEntry>> {
    let mut inputs = Vec::new();
    let walker = WalkDir::new(root).sort_by(|a, b| {
        a.file_type()
            .is_dir()
            .cmp(&b.file_type().is_dir())
            .then_with(|| a.file_name().cmp(b.file_name()))
    });
    for dirent in walker {
        let dirent = dirent.map_err(io::Error::from)?;
        if !dirent.file_type().is_file() {
            continue;
        }
        let rel = dirent.path().strip_prefix(root).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "walked entry outside enumeration root",
            )
        })?;
        let name = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        inputs.push(SourceEntry::new(dirent.path(), name)?);
    }
    debug!(root = %root.display(), files = inputs.len(), "enumerated inputs");
    Ok(inputs)
}

/// Pack `inputs`, in order, into a package at `dest`.
pub fn pack(
    inputs: &[SourceEntry],
    dest: &Path,
    opts: PackOptions,
    progress: ProgressFn,
) -> Result<Header> {
    let total: u64 = inputs.iter().map(|e| e.size() as u64).sum();
    let mut writer = PackWriter::create(dest, opts)?;
    let mut records = Vec::with_capacity(inputs.len());
    let mut processed = 0u64;
    for input in inputs {
        progress(input.name(), processed, total);
        records.push(writer.write_entry(input)?);
        processed += input.size() as u64;
    }
    let header = writer.finalize(&records)?;
    writer.close();
    Ok(header)
}

/// Extract every entry of the package at `path` into `dest`, in directory
/// order, creating intermediate directories as needed.
pub fn extract_all(path: &Path, dest: &Path, progress: ProgressFn) -> Result<()> {
    let mut reader = PackReader::open(path)?;
    let total: u64 = reader.entries.iter().map(|e| e.size() as u64).sum();
    let mut processed = 0u64;
    for entry in &reader.entries {
        progress(entry.name(), processed, total);
        let target = sanitized_join(dest, entry.name());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&target)?;
        io::copy(&mut entry.open_reader()?, &mut out)?;
        processed += entry.size() as u64;
    }
    reader.close();
    Ok(())
}

/// Join an entry name under `dest`, keeping only normal path components so
/// a hostile name cannot escape the destination root.
fn sanitized_join(dest: &Path, name: &str) -> PathBuf {
    let mut target = dest.to_owned();
    for component in Path::new(name).components() {
        if let Component::Normal(part) = component {
            target.push(part);
        }
    }
    target
}
