use mpak::archive;
use mpak::codec::{Level, Method};
use mpak::entry::{LogicalFile, SourceEntry};
use mpak::error::Error;
use mpak::header::{HEADER_SIZE, TRAILER_SIZE, VERSION};
use mpak::pack_io::{part_path, PackOptions, PackReader, PackWriter, ALIGN, PAD_BYTE};
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use tempfile::tempdir;

/// In-memory writer input used where no source file is needed.
struct MemEntry {
    name: String,
    data: Vec<u8>,
}

impl MemEntry {
    fn new(name: &str, data: Vec<u8>) -> Self {
        Self {
            name: name.to_owned(),
            data,
        }
    }
}

impl LogicalFile for MemEntry {
    fn name(&self) -> &str {
        &self.name
    }
    fn size(&self) -> u32 {
        self.data.len() as u32
    }
    fn checksum(&self) -> mpak::Result<u32> {
        Err(Error::ChecksumUnavailable)
    }
    fn open_reader(&self) -> mpak::Result<Box<dyn Read>> {
        Ok(Box::new(Cursor::new(self.data.clone())))
    }
}

fn read_entry(entry: &mpak::ArchivedEntry) -> Vec<u8> {
    let mut out = Vec::new();
    entry.open_reader().unwrap().read_to_end(&mut out).unwrap();
    out
}

/// Mixed content: compressible runs with position-dependent noise.
fn sample_bytes(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| if i % 7 == 0 { (i * 31 % 251) as u8 } else { b'x' })
        .collect()
}

#[test]
fn roundtrip_all_methods_and_levels() {
    for method in [Method::None, Method::Zlib, Method::Lz4] {
        for level in [Level::Default, Level::Fast] {
            let dir = tempdir().unwrap();
            let pack = dir.path().join("pack.mpk");

            let files = vec![
                MemEntry::new("empty.dat", Vec::new()),
                MemEntry::new("small.txt", b"under one alignment unit".to_vec()),
                MemEntry::new("big.bin", sample_bytes(5000)),
            ];

            {
                let opts = PackOptions {
                    method,
                    level,
                    ..PackOptions::default()
                };
                let mut writer = PackWriter::create(&pack, opts).unwrap();
                let mut records = Vec::new();
                for file in &files {
                    records.push(writer.write_entry(file).unwrap());
                }
                let header = writer.finalize(&records).unwrap();
                assert_eq!(header.num_parts, 1);
            }

            {
                let reader = PackReader::open(&pack).unwrap();
                assert_eq!(reader.entries.len(), files.len());
                for (entry, file) in reader.entries.iter().zip(&files) {
                    assert_eq!(entry.name(), file.name());
                    assert_eq!(entry.size() as usize, file.data.len());
                    assert_eq!(read_entry(entry), file.data);
                }
            }
        }
    }
}

#[test]
fn entries_are_aligned_and_padded() {
    let dir = tempdir().unwrap();
    let pack = dir.path().join("pack.mpk");

    let header = {
        let opts = PackOptions {
            method: Method::None,
            ..PackOptions::default()
        };
        let mut writer = PackWriter::create(&pack, opts).unwrap();
        let first = writer
            .write_entry(&MemEntry::new("a.bin", b"hello".to_vec()))
            .unwrap();
        let second = writer
            .write_entry(&MemEntry::new("b.bin", sample_bytes(100)))
            .unwrap();
        assert_eq!(first.offset, 0);
        assert_eq!(second.offset % ALIGN as u32, 0);
        assert_eq!(second.offset, 64);
        writer.finalize(&[first, second]).unwrap()
    };

    // "hello" occupies bytes 0..5; the rest of its 64-byte slot is filler.
    let bytes = fs::read(&pack).unwrap();
    assert_eq!(&bytes[..5], b"hello");
    assert!(bytes[5..64].iter().all(|&b| b == PAD_BYTE));

    // The directory starts on an alignment boundary, right after the padded
    // data region.
    assert_eq!(header.file_list_offset % ALIGN as u32, 0);
    assert_eq!(header.file_list_offset, 64 + 128);
}

#[test]
fn spanning_produces_multiple_parts() {
    let dir = tempdir().unwrap();
    let pack = dir.path().join("pack.mpk");

    let files: Vec<MemEntry> = (0..3)
        .map(|i| MemEntry::new(&format!("file{i}.bin"), sample_bytes(200)))
        .collect();

    {
        let opts = PackOptions {
            method: Method::None,
            part_size_limit: 256,
            ..PackOptions::default()
        };
        let mut writer = PackWriter::create(&pack, opts).unwrap();
        let mut records = Vec::new();
        for file in &files {
            records.push(writer.write_entry(file).unwrap());
        }
        let part_indexes: Vec<u32> = records.iter().map(|r| r.part_index).collect();
        assert_eq!(part_indexes, vec![0, 1, 2]);
        assert_eq!(writer.num_parts(), 3);
        let header = writer.finalize(&records).unwrap();
        assert_eq!(header.num_parts, 3);
    }

    assert!(part_path(&pack, 1).exists());
    assert!(part_path(&pack, 2).exists());

    let reader = PackReader::open(&pack).unwrap();
    assert_eq!(reader.header.num_parts, 3);
    for (entry, file) in reader.entries.iter().zip(&files) {
        assert_eq!(read_entry(entry), file.data);
    }
}

#[test]
fn missing_part_is_fatal() {
    let dir = tempdir().unwrap();
    let pack = dir.path().join("pack.mpk");

    {
        let opts = PackOptions {
            method: Method::None,
            part_size_limit: 256,
            ..PackOptions::default()
        };
        let mut writer = PackWriter::create(&pack, opts).unwrap();
        let records = vec![
            writer
                .write_entry(&MemEntry::new("a.bin", sample_bytes(200)))
                .unwrap(),
            writer
                .write_entry(&MemEntry::new("b.bin", sample_bytes(200)))
                .unwrap(),
        ];
        writer.finalize(&records).unwrap();
    }

    fs::remove_file(part_path(&pack, 1)).unwrap();
    assert!(matches!(
        PackReader::open(&pack),
        Err(Error::MissingPart(_))
    ));
}

#[test]
fn tampered_data_fails_checksum() {
    let dir = tempdir().unwrap();
    let pack = dir.path().join("pack.mpk");
    let content = b"content that will be corrupted".to_vec();

    {
        let opts = PackOptions {
            method: Method::None,
            ..PackOptions::default()
        };
        let mut writer = PackWriter::create(&pack, opts).unwrap();
        let record = writer
            .write_entry(&MemEntry::new("victim.bin", content))
            .unwrap();
        writer.finalize(&[record]).unwrap();
    }

    // Flip one byte inside the file-data region.
    let mut bytes = fs::read(&pack).unwrap();
    bytes[3] ^= 0xFF;
    fs::write(&pack, &bytes).unwrap();

    // The directory is intact, so open succeeds; reading the entry must not.
    let reader = PackReader::open(&pack).unwrap();
    match reader.entries[0].open_reader() {
        Err(Error::ChecksumMismatch { name, expected, actual }) => {
            assert_eq!(name, "victim.bin");
            assert_ne!(expected, actual);
        }
        other => panic!("expected ChecksumMismatch, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn wrong_version_rejected_before_directory_parse() {
    let dir = tempdir().unwrap();
    let pack = dir.path().join("pack.mpk");

    {
        let mut writer = PackWriter::create(&pack, PackOptions::default()).unwrap();
        let record = writer
            .write_entry(&MemEntry::new("a.txt", b"data".to_vec()))
            .unwrap();
        writer.finalize(&[record]).unwrap();
    }

    // The header sits immediately before the 8-byte trailer; version is its
    // first field.
    let mut bytes = fs::read(&pack).unwrap();
    let header_start = bytes.len() - HEADER_SIZE - TRAILER_SIZE;
    bytes[header_start..header_start + 4].copy_from_slice(&99u32.to_le_bytes());
    fs::write(&pack, &bytes).unwrap();

    match PackReader::open(&pack) {
        Err(Error::UnsupportedVersion { found, supported }) => {
            assert_eq!(found, 99);
            assert_eq!(supported, VERSION);
        }
        other => panic!("expected UnsupportedVersion, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn oversized_directory_count_rejected() {
    let dir = tempdir().unwrap();
    let pack = dir.path().join("pack.mpk");

    let header = {
        let mut writer = PackWriter::create(&pack, PackOptions::default()).unwrap();
        let record = writer
            .write_entry(&MemEntry::new("a.txt", b"data".to_vec()))
            .unwrap();
        writer.finalize(&[record]).unwrap()
    };

    // Overwrite the 4-byte record count with a value no directory blob of
    // this size could ever decompress to.  Open must fail with a corrupt
    // directory, not attempt a multi-gigabyte decode.
    let mut bytes = fs::read(&pack).unwrap();
    let count_at = header.file_list_offset as usize;
    bytes[count_at..count_at + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    fs::write(&pack, &bytes).unwrap();

    assert!(matches!(
        PackReader::open(&pack),
        Err(Error::DirectoryCorrupt { .. })
    ));
}

#[test]
fn truncated_trailer_rejected() {
    let dir = tempdir().unwrap();
    let not_a_pack = dir.path().join("junk.mpk");
    fs::write(&not_a_pack, b"clearly not a package at all").unwrap();
    assert!(matches!(
        PackReader::open(&not_a_pack),
        Err(Error::InvalidSignature)
    ));
}

#[test]
fn example_scenario_three_files() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(src.join("dir")).unwrap();
    fs::write(src.join("a.txt"), b"ten bytes!").unwrap();
    fs::write(src.join("dir/b.bin"), sample_bytes(5000)).unwrap();
    fs::write(src.join("c.dat"), b"").unwrap();

    let pack = dir.path().join("scenario.mpk");
    {
        let mut writer = PackWriter::create(&pack, PackOptions::default()).unwrap();
        let specs: [(&str, &str, Method, Level); 3] = [
            ("a.txt", "a.txt", Method::None, Level::Default),
            ("dir/b.bin", "dir/b.bin", Method::Zlib, Level::Default),
            ("c.dat", "c.dat", Method::Lz4, Level::Fast),
        ];
        let mut records = Vec::new();
        for (rel, name, method, level) in specs {
            let input = SourceEntry::new(src.join(rel), name).unwrap();
            records.push(writer.write_entry_with(&input, method, level).unwrap());
        }
        let header = writer.finalize(&records).unwrap();
        assert_eq!(header.num_parts, 1);
    }

    {
        let reader = PackReader::open(&pack).unwrap();
        let names: Vec<&str> = reader.entries.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["a.txt", "dir/b.bin", "c.dat"]);
    }

    // Extraction restores content and creates dir/ implicitly; the progress
    // sink fires once per file, in directory order.
    let restored = dir.path().join("restored");
    let mut seen = Vec::new();
    let mut progress = |name: &str, _done: u64, _total: u64| seen.push(name.to_owned());
    archive::extract_all(&pack, &restored, &mut progress).unwrap();

    assert_eq!(seen, vec!["a.txt", "dir/b.bin", "c.dat"]);
    assert_eq!(fs::read(restored.join("a.txt")).unwrap(), b"ten bytes!");
    assert_eq!(fs::read(restored.join("dir/b.bin")).unwrap(), sample_bytes(5000));
    assert_eq!(fs::read(restored.join("c.dat")).unwrap(), b"");
}

#[test]
fn pack_and_extract_directory_tree() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("tree");
    fs::create_dir_all(src.join("nested/deeper")).unwrap();
    fs::write(src.join("root.txt"), b"root file").unwrap();
    fs::write(src.join("nested/mid.bin"), sample_bytes(300)).unwrap();
    fs::write(src.join("nested/deeper/leaf.dat"), sample_bytes(90)).unwrap();

    let pack = dir.path().join("tree.mpk");
    let inputs = archive::collect_inputs(&src).unwrap();
    let mut progress = |_: &str, _: u64, _: u64| {};
    let header = archive::pack(&inputs, &pack, PackOptions::default(), &mut progress).unwrap();
    assert_eq!(header.num_parts, 1);

    let out = dir.path().join("out");
    archive::extract_all(&pack, &out, &mut progress).unwrap();
    assert_eq!(fs::read(out.join("root.txt")).unwrap(), b"root file");
    assert_eq!(fs::read(out.join("nested/mid.bin")).unwrap(), sample_bytes(300));
    assert_eq!(
        fs::read(out.join("nested/deeper/leaf.dat")).unwrap(),
        sample_bytes(90)
    );
}

#[test]
fn progress_reports_running_totals() {
    let dir = tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("one.bin"), vec![1u8; 100]).unwrap();
    fs::write(src.join("two.bin"), vec![2u8; 50]).unwrap();

    let pack = dir.path().join("p.mpk");
    let inputs = archive::collect_inputs(&src).unwrap();
    let mut calls = Vec::new();
    let mut progress =
        |name: &str, done: u64, total: u64| calls.push((name.to_owned(), done, total));
    archive::pack(&inputs, &pack, PackOptions::default(), &mut progress).unwrap();

    assert_eq!(
        calls,
        vec![
            ("one.bin".to_owned(), 0, 150),
            ("two.bin".to_owned(), 100, 150),
        ]
    );
}

#[test]
fn secondary_parts_carry_no_trailer() {
    let dir = tempdir().unwrap();
    let pack = dir.path().join("pack.mpk");

    {
        let opts = PackOptions {
            method: Method::None,
            part_size_limit: 128,
            ..PackOptions::default()
        };
        let mut writer = PackWriter::create(&pack, opts).unwrap();
        let records = vec![
            writer
                .write_entry(&MemEntry::new("a.bin", sample_bytes(100)))
                .unwrap(),
            writer
                .write_entry(&MemEntry::new("b.bin", sample_bytes(100)))
                .unwrap(),
        ];
        writer.finalize(&records).unwrap();
    }

    // Part 1 holds only the padded file data: 100 bytes rounded up to 128.
    let part1 = fs::read(part_path(Path::new(&pack), 1)).unwrap();
    assert_eq!(part1.len(), 128);
}
