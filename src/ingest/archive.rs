//! Gzip-compressed tar archives of individual messages.
//!
//! In archive mode there is no mbox splitting: every regular entry whose name
//! contains `.mbox` or `.txt` is one complete message. Entry content is
//! capped with the same ceiling the splitter uses.

use crate::error::{StatsError, StatsResult};
use crate::ingest::splitter::RawMessage;
use flate2::bufread::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Entry names that carry a message.
pub fn is_message_entry(name: &str) -> bool {
    name.contains(".mbox") || name.contains(".txt")
}

/// True when the buffered stream starts with a gzip member header.
pub fn looks_gzipped<R: BufRead>(reader: &mut R) -> std::io::Result<bool> {
    let head = reader.fill_buf()?;
    Ok(head.len() >= GZIP_MAGIC.len() && head[..GZIP_MAGIC.len()] == GZIP_MAGIC)
}

/// Decompressed view of an archive file. Concatenated gzip members are read
/// as one stream.
pub type ArchiveReader = BufReader<MultiGzDecoder<BufReader<File>>>;

/// Open `path` as a gzip stream, failing fast when it is not gzip at all.
pub fn open_archive(path: &Path) -> StatsResult<ArchiveReader> {
    let file = File::open(path).map_err(|source| StatsError::OpenInput {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);

    let gzipped = looks_gzipped(&mut reader).map_err(|e| StatsError::Decompress {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !gzipped {
        return Err(StatsError::Decompress {
            path: path.to_path_buf(),
            reason: "missing gzip header".to_string(),
        });
    }

    decode_archive(path, reader)
}

/// Wrap a gzip stream and decode its first block, so a corrupt header or
/// deflate stream fails here instead of midway through the scan.
pub fn decode_archive(path: &Path, reader: BufReader<File>) -> StatsResult<ArchiveReader> {
    let mut decoded = BufReader::new(MultiGzDecoder::new(reader));
    decoded.fill_buf().map_err(|e| StatsError::Decompress {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(decoded)
}

/// Feed every message entry of a tar stream to `sink`.
///
/// Stops at the first unreadable tar header (the rest of the stream cannot be
/// trusted) or when `sink` returns `false`. Returns the number of messages
/// handed to `sink`.
pub fn scan_archive<R, F>(reader: R, max_message_bytes: usize, mut sink: F) -> usize
where
    R: Read,
    F: FnMut(RawMessage) -> bool,
{
    let mut archive = tar::Archive::new(reader);
    let entries = match archive.entries() {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("unable to read archive entries: {}", e);
            return 0;
        }
    };

    let mut emitted = 0;
    for entry in entries {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                log::warn!("archive read stopped after {} messages: {}", emitted, e);
                break;
            }
        };

        if !entry.header().entry_type().is_file() {
            continue;
        }

        let name = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(e) => {
                log::warn!("skipping archive entry with unreadable name: {}", e);
                continue;
            }
        };
        if !is_message_entry(&name) {
            log::trace!("skipping archive entry {}", name);
            continue;
        }

        let declared = entry.header().size().unwrap_or(0);
        let mut content = Vec::new();
        if let Err(e) = (&mut entry)
            .take(max_message_bytes as u64)
            .read_to_end(&mut content)
        {
            log::warn!("failed to read archive entry {}: {}", name, e);
            continue;
        }

        let message = RawMessage {
            index: emitted,
            envelope: None,
            observed_bytes: declared.max(content.len() as u64),
            content,
        };
        if message.is_truncated() {
            log::warn!(
                "archive entry {} truncated: {} bytes declared, kept first {}",
                name,
                message.observed_bytes,
                message.content.len()
            );
        }

        emitted += 1;
        if !sink(message) {
            break;
        }
    }

    emitted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::build_tar_gz;
    use flate2::Compression;
    use flate2::read::GzDecoder as ReadGzDecoder;
    use flate2::write::GzEncoder;
    use std::io::{Cursor, Write};

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_entry_name_filter() {
        assert!(is_message_entry("inbox/0001.mbox"));
        assert!(is_message_entry("notes.txt"));
        assert!(is_message_entry("weird.mbox.bak"));
        assert!(!is_message_entry("README.md"));
    }

    #[test]
    fn test_gzip_detection() {
        let archive = build_tar_gz(&[("a.txt", b"x".as_slice())]);
        assert!(looks_gzipped(&mut Cursor::new(archive)).unwrap());
        assert!(!looks_gzipped(&mut Cursor::new(b"From x\n".to_vec())).unwrap());
        assert!(!looks_gzipped(&mut Cursor::new(Vec::new())).unwrap());
    }

    #[test]
    fn test_scan_filters_entries_and_caps_size() {
        let archive = build_tar_gz(&[
            ("msgs/1.mbox", b"Subject: one\n\nbody\n".as_slice()),
            ("msgs/index.html", b"<html>".as_slice()),
            ("msgs/2.txt", b"Subject: a much longer message\n\nbody\n".as_slice()),
        ]);

        let mut seen = Vec::new();
        let count = scan_archive(ReadGzDecoder::new(Cursor::new(archive)), 16, |message| {
            seen.push(message);
            true
        });

        assert_eq!(count, 2);
        assert_eq!(seen[0].content, b"Subject: one\n\nbo");
        assert_eq!(seen[1].content.len(), 16);
        assert!(seen[1].is_truncated());
        assert_eq!(seen[1].index, 1);
    }

    #[test]
    fn test_scan_stops_when_sink_declines() {
        let archive = build_tar_gz(&[
            ("1.txt", b"Subject: 1\n\n".as_slice()),
            ("2.txt", b"Subject: 2\n\n".as_slice()),
        ]);

        let count = scan_archive(ReadGzDecoder::new(Cursor::new(archive)), 1024, |_| false);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_open_archive_rejects_plain_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbox.mbox");
        std::fs::write(&path, b"From x\nSubject: s\n").unwrap();

        let err = open_archive(&path).unwrap_err();
        assert!(matches!(err, StatsError::Decompress { .. }));
    }

    #[test]
    fn test_open_archive_rejects_corrupt_gzip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tar.gz");
        std::fs::write(&path, [0x1f, 0x8b, 0x63, 0, 0, 0, 0, 0, 0, 0xff, 1, 2, 3]).unwrap();

        let err = open_archive(&path).unwrap_err();
        assert!(matches!(err, StatsError::Decompress { .. }));
    }

    #[test]
    fn test_concatenated_gzip_members_are_one_stream() {
        let mut builder = tar::Builder::new(Vec::new());
        let entries = [
            ("1.mbox", b"Subject: 1\n\n".as_slice()),
            ("2.mbox", b"Subject: 2\n\n".as_slice()),
        ];
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            builder.append_data(&mut header, name, content).unwrap();
        }
        let tarball = builder.into_inner().unwrap();

        // Split after the first entry (header + one padded block).
        let (head, tail) = tarball.split_at(1024);
        let mut members = gzip(head);
        members.extend(gzip(tail));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("multi.tar.gz");
        std::fs::write(&path, members).unwrap();

        let mut seen = Vec::new();
        let count = scan_archive(open_archive(&path).unwrap(), 1024, |message| {
            seen.push(message.content);
            true
        });
        assert_eq!(count, 2);
        assert_eq!(seen[1], b"Subject: 2\n\n");
    }
}
