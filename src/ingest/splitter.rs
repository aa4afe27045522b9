//! Mbox message splitting.
//!
//! An mbox file is a flat concatenation of messages, each introduced by an
//! envelope line starting with `From `. [`MboxSplitter`] walks a buffered
//! reader line by line and yields one [`RawMessage`] per envelope, holding
//! the bytes between that envelope line and the next one (or end of stream).
//!
//! # Size ceiling
//!
//! A corrupt mailbox with a missing separator would otherwise concatenate
//! everything into one unbounded buffer. Each in-progress message therefore
//! has a byte ceiling: once crossed, the splitter switches from
//! `Accumulating` to `Truncating`, stops capturing, but keeps counting bytes
//! so the true size is known. The message is still emitted, holding exactly
//! its first `max_message_bytes` bytes. The next envelope resets the state.
//!
//! Lines are handled as raw bytes; no UTF-8 validation happens here.

use std::io::BufRead;

/// Envelope-sender marker that starts every mbox message.
pub const SEPARATOR: &[u8] = b"From ";

/// One delimited message, handed off exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Zero-based position in the input stream.
    pub index: usize,
    /// Envelope line that introduced this message, if any.
    pub envelope: Option<Vec<u8>>,
    /// Captured header block and body, capped at the ceiling.
    pub content: Vec<u8>,
    /// Bytes seen for this message, including anything dropped.
    pub observed_bytes: u64,
}

impl RawMessage {
    pub fn is_truncated(&self) -> bool {
        self.observed_bytes > self.content.len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    Accumulating,
    Truncating,
}

/// Streaming mbox splitter over any [`BufRead`].
pub struct MboxSplitter<R> {
    reader: R,
    max_message_bytes: usize,
    state: CaptureState,
    envelope: Option<Vec<u8>>,
    current: Vec<u8>,
    observed: u64,
    line: Vec<u8>,
    emitted: usize,
    finished: bool,
}

impl<R: BufRead> MboxSplitter<R> {
    pub fn new(reader: R, max_message_bytes: usize) -> Self {
        Self {
            reader,
            max_message_bytes,
            state: CaptureState::Accumulating,
            envelope: None,
            current: Vec::new(),
            observed: 0,
            line: Vec::new(),
            emitted: 0,
            finished: false,
        }
    }

    fn push_line(&mut self) {
        self.observed += self.line.len() as u64;
        if self.state == CaptureState::Truncating {
            return;
        }

        let room = self.max_message_bytes.saturating_sub(self.current.len());
        if self.line.len() <= room {
            self.current.extend_from_slice(&self.line);
        } else {
            self.current.extend_from_slice(&self.line[..room]);
            self.state = CaptureState::Truncating;
        }
    }

    /// Hand off the in-progress message and reset for the next one.
    fn take_message(&mut self, next_envelope: Option<Vec<u8>>) -> Option<RawMessage> {
        let envelope = std::mem::replace(&mut self.envelope, next_envelope);
        let content = std::mem::take(&mut self.current);
        let observed_bytes = std::mem::take(&mut self.observed);
        self.state = CaptureState::Accumulating;

        // Only the stretch before the first envelope may vanish; an envelope
        // with nothing under it is still a message.
        if envelope.is_none() && observed_bytes == 0 {
            return None;
        }

        let message = RawMessage {
            index: self.emitted,
            envelope,
            content,
            observed_bytes,
        };
        self.emitted += 1;

        if message.is_truncated() {
            log::warn!(
                "message {} truncated: {} bytes seen, kept first {}",
                message.index,
                message.observed_bytes,
                message.content.len()
            );
        }

        Some(message)
    }

    /// Number of messages yielded so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }
}

impl<R: BufRead> Iterator for MboxSplitter<R> {
    type Item = RawMessage;

    fn next(&mut self) -> Option<RawMessage> {
        if self.finished {
            return None;
        }

        loop {
            self.line.clear();
            match self.reader.read_until(b'\n', &mut self.line) {
                Ok(0) => {
                    self.finished = true;
                    return self.take_message(None);
                }
                Ok(_) if self.line.starts_with(SEPARATOR) => {
                    let envelope = Some(self.line.clone());
                    if let Some(message) = self.take_message(envelope) {
                        return Some(message);
                    }
                }
                Ok(_) => self.push_line(),
                Err(e) => {
                    log::warn!("mbox read failed after {} messages: {}", self.emitted, e);
                    self.push_line();
                    self.finished = true;
                    return self.take_message(None);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, BufReader, Cursor, Read};

    fn split(input: &[u8], ceiling: usize) -> Vec<RawMessage> {
        MboxSplitter::new(Cursor::new(input.to_vec()), ceiling).collect()
    }

    #[test]
    fn test_splits_on_envelope_lines() {
        let input = b"From a@example.com Mon Mar  4 10:00:00 2024\n\
Subject: one\n\
\n\
body one\n\
From b@example.com Tue Mar  5 10:00:00 2024\n\
Subject: two\n\
\n\
body two\n";

        let messages = split(input, 1024);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, b"Subject: one\n\nbody one\n");
        assert_eq!(messages[1].content, b"Subject: two\n\nbody two\n");
        assert_eq!(messages[1].index, 1);
        assert!(
            messages[0]
                .envelope
                .as_deref()
                .unwrap()
                .starts_with(b"From a@example.com")
        );
    }

    #[test]
    fn test_from_header_is_not_a_separator() {
        let input = b"From x Mon Mar  4 10:00:00 2024\nFrom: someone@example.com\n\nhi\n";
        let messages = split(input, 1024);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, b"From: someone@example.com\n\nhi\n");
    }

    #[test]
    fn test_final_message_without_trailing_newline_is_kept() {
        let input = b"From x\nSubject: a\n\nlast line";
        let messages = split(input, 1024);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, b"Subject: a\n\nlast line");
    }

    #[test]
    fn test_empty_input_yields_nothing() {
        assert!(split(b"", 1024).is_empty());
    }

    #[test]
    fn test_bare_envelopes_are_emitted_empty() {
        let messages = split(b"From only-an-envelope\n", 1024);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.is_empty());

        let messages = split(b"From a\nFrom b\nSubject: x\n\nbody\n", 1024);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].envelope.as_deref(), Some(b"From a\n".as_slice()));
        assert!(messages[0].content.is_empty());
        assert_eq!(messages[1].content, b"Subject: x\n\nbody\n");
    }

    #[test]
    fn test_oversized_message_is_truncated_not_dropped() {
        let mut input = b"From big\n".to_vec();
        for _ in 0..100 {
            input.extend_from_slice(b"0123456789\n");
        }
        input.extend_from_slice(b"From small\nSubject: s\n");

        let messages = split(&input, 64);
        assert_eq!(messages.len(), 2);

        let big = &messages[0];
        assert!(big.is_truncated());
        assert_eq!(big.content.len(), 64);
        assert_eq!(big.observed_bytes, 1100);
        assert_eq!(&big.content[..11], b"0123456789\n");

        // The ceiling resets on the next envelope.
        assert!(!messages[1].is_truncated());
        assert_eq!(messages[1].content, b"Subject: s\n");
    }

    #[test]
    fn test_rejoining_messages_reproduces_input() {
        let inputs: [&[u8]; 3] = [
            b"From a\nSubject: 1\n\nx\nFrom b\nSubject: 2\n\ny\nFrom c\nSubject: 3\n\nz\n",
            b"From a\nFrom b\nSubject: x\n\nbody\n",
            b"preamble\nFrom a\nSubject: 1\n\nx\nFrom b\n",
        ];
        for input in inputs {
            let mut rejoined = Vec::new();
            for message in split(input, 1024) {
                rejoined.extend_from_slice(message.envelope.as_deref().unwrap_or_default());
                rejoined.extend_from_slice(&message.content);
            }
            assert_eq!(rejoined, input.to_vec());
        }
    }

    struct FailingReader {
        data: Cursor<Vec<u8>>,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(io::Error::new(io::ErrorKind::Other, "disk went away")),
                n => Ok(n),
            }
        }
    }

    #[test]
    fn test_read_error_flushes_in_progress_message() {
        let reader = BufReader::new(FailingReader {
            data: Cursor::new(b"From a\nSubject: 1\n\nbody\n".to_vec()),
        });
        let messages: Vec<_> = MboxSplitter::new(reader, 1024).collect();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, b"Subject: 1\n\nbody\n");
    }
}
