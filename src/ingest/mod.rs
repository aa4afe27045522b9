//! Input handling.
//!
//! Two input shapes feed the same pipeline:
//!
//! - **mbox**: one flat file, split into messages by [`splitter::MboxSplitter`].
//! - **archive**: a gzip-compressed tar whose `.mbox`/`.txt` entries are one
//!   message each ([`archive::scan_archive`]).
//!
//! [`MessageSource::open`] does all fallible setup up front so that open and
//! decompression failures are reported before any message is processed.
//! [`MessageSource::scan`] is blocking and is meant to run on its own thread.

pub mod archive;
pub mod parser;
pub mod splitter;

use crate::error::{StatsError, StatsResult};
use archive::ArchiveReader;
use splitter::{MboxSplitter, RawMessage};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::str::FromStr;

/// How to interpret the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputFormat {
    /// Gzip magic bytes select archive mode, anything else is mbox.
    #[default]
    Auto,
    Mbox,
    Archive,
}

impl FromStr for InputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(InputFormat::Auto),
            "mbox" => Ok(InputFormat::Mbox),
            "archive" | "tar.gz" | "tgz" => Ok(InputFormat::Archive),
            other => Err(format!(
                "unsupported input format '{other}'. Use 'auto', 'mbox' or 'archive'."
            )),
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputFormat::Auto => "auto",
            InputFormat::Mbox => "mbox",
            InputFormat::Archive => "archive",
        };
        f.write_str(name)
    }
}

/// An opened input, ready to be scanned.
pub enum MessageSource {
    Mbox(BufReader<File>),
    Archive(ArchiveReader),
}

impl MessageSource {
    pub fn open(path: &Path, format: InputFormat) -> StatsResult<Self> {
        let open_error = |source: std::io::Error| StatsError::OpenInput {
            path: path.to_path_buf(),
            source,
        };

        match format {
            InputFormat::Archive => archive::open_archive(path).map(MessageSource::Archive),
            InputFormat::Mbox => {
                let file = File::open(path).map_err(open_error)?;
                Ok(MessageSource::Mbox(BufReader::new(file)))
            }
            InputFormat::Auto => {
                let file = File::open(path).map_err(open_error)?;
                let mut reader = BufReader::new(file);
                if archive::looks_gzipped(&mut reader).map_err(open_error)? {
                    archive::decode_archive(path, reader).map(MessageSource::Archive)
                } else {
                    Ok(MessageSource::Mbox(reader))
                }
            }
        }
    }

    /// Resolved format after auto-detection.
    pub fn format(&self) -> InputFormat {
        match self {
            MessageSource::Mbox(_) => InputFormat::Mbox,
            MessageSource::Archive(_) => InputFormat::Archive,
        }
    }

    /// Hand every message to `sink` in input order.
    ///
    /// Stops at end of input or as soon as `sink` returns `false`. Returns the
    /// number of messages produced.
    pub fn scan<F>(self, max_message_bytes: usize, mut sink: F) -> usize
    where
        F: FnMut(RawMessage) -> bool,
    {
        match self {
            MessageSource::Mbox(reader) => {
                let mut splitter = MboxSplitter::new(reader, max_message_bytes);
                for message in splitter.by_ref() {
                    if !sink(message) {
                        break;
                    }
                }
                splitter.emitted()
            }
            MessageSource::Archive(reader) => {
                archive::scan_archive(reader, max_message_bytes, sink)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::build_tar_gz;

    #[test]
    fn test_input_format_from_str() {
        assert_eq!("MBOX".parse::<InputFormat>(), Ok(InputFormat::Mbox));
        assert_eq!("tgz".parse::<InputFormat>(), Ok(InputFormat::Archive));
        assert_eq!("auto".parse::<InputFormat>(), Ok(InputFormat::Auto));
        assert!("zip".parse::<InputFormat>().is_err());
    }

    #[test]
    fn test_auto_detects_archive_and_mbox() {
        let dir = tempfile::tempdir().unwrap();

        let mbox_path = dir.path().join("inbox.mbox");
        std::fs::write(&mbox_path, b"From a\nSubject: 1\n\nx\nFrom b\nSubject: 2\n\ny\n").unwrap();
        let source = MessageSource::open(&mbox_path, InputFormat::Auto).unwrap();
        assert_eq!(source.format(), InputFormat::Mbox);
        assert_eq!(source.scan(1024, |_| true), 2);

        let archive_path = dir.path().join("inbox.bin");
        std::fs::write(
            &archive_path,
            build_tar_gz(&[("a.mbox", b"Subject: 1\n\n".as_slice())]),
        )
        .unwrap();
        let source = MessageSource::open(&archive_path, InputFormat::Auto).unwrap();
        assert_eq!(source.format(), InputFormat::Archive);
        assert_eq!(source.scan(1024, |_| true), 1);
    }

    #[test]
    fn test_missing_input_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.mbox");
        for format in [InputFormat::Auto, InputFormat::Mbox, InputFormat::Archive] {
            let err = MessageSource::open(&missing, format).err().unwrap();
            assert!(matches!(err, StatsError::OpenInput { .. }), "{format}");
        }
    }

    #[test]
    fn test_corrupt_gzip_is_fatal_at_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.tar.gz");
        std::fs::write(&path, [0x1f, 0x8b, 0x63, 0, 0, 0, 0, 0, 0, 0xff, 1, 2, 3]).unwrap();

        for format in [InputFormat::Auto, InputFormat::Archive] {
            let err = MessageSource::open(&path, format).err().unwrap();
            assert!(matches!(err, StatsError::Decompress { .. }), "{format}");
        }
    }

    #[test]
    fn test_scan_stops_when_sink_declines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inbox.mbox");
        std::fs::write(&path, b"From a\nSubject: 1\n\nFrom b\nSubject: 2\n\n").unwrap();

        let source = MessageSource::open(&path, InputFormat::Mbox).unwrap();
        assert_eq!(source.scan(1024, |_| false), 1);
    }
}
