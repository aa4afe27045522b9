//! Producer/consumer driver.
//!
//! The input is scanned on a blocking thread and each message is handed to
//! the consumer over a bounded channel of depth [`HANDOFF_DEPTH`]. The
//! producer blocks until the consumer has drained the previous message, so at
//! most one message waits in the channel and order is preserved. The consumer
//! parses headers, classifies and folds into the month map, which only it
//! touches.
//!
//! A single bad message never stops the run: parse failures and
//! unclassifiable auth headers are logged and counted in [`RunSummary`],
//! exclusions are counted silently. The run ends when the producer reaches
//! end of input and drops its sender.

use crate::error::{StatsError, StatsResult};
use crate::ingest::MessageSource;
use crate::ingest::parser::{ParseHeadersError, parse_message_headers};
use crate::ingest::splitter::RawMessage;
use crate::stats::{Classifier, MonthlyStats, RunSummary, Verdict};
use std::io::Write;
use tokio::sync::mpsc;

/// Messages allowed to wait between producer and consumer.
pub const HANDOFF_DEPTH: usize = 1;

/// Everything a finished run produced.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub stats: MonthlyStats,
    pub summary: RunSummary,
}

pub struct Pipeline {
    classifier: Classifier,
    max_message_bytes: usize,
    progress: bool,
}

impl Pipeline {
    pub fn new(classifier: Classifier, max_message_bytes: usize) -> Self {
        Self {
            classifier,
            max_message_bytes,
            progress: false,
        }
    }

    /// Print one `.` to stderr per message attempted.
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Drain `source` through the classifier.
    pub async fn run(&self, source: MessageSource) -> StatsResult<RunOutcome> {
        let (tx, mut rx) = mpsc::channel::<RawMessage>(HANDOFF_DEPTH);
        let max_message_bytes = self.max_message_bytes;

        let producer = tokio::task::spawn_blocking(move || {
            source.scan(max_message_bytes, |message| tx.blocking_send(message).is_ok())
        });

        let mut outcome = RunOutcome::default();
        while let Some(message) = rx.recv().await {
            self.consume(&message, &mut outcome);
        }

        let produced = producer
            .await
            .map_err(|e| StatsError::Producer(format!("scanner task failed: {}", e)))?;

        if self.progress {
            eprintln!();
        }
        log::debug!(
            "producer finished: {} messages produced, {} consumed",
            produced,
            outcome.summary.scanned
        );

        Ok(outcome)
    }

    /// Parse, classify and fold one message.
    pub fn consume(&self, message: &RawMessage, outcome: &mut RunOutcome) {
        let summary = &mut outcome.summary;
        summary.scanned += 1;
        if message.is_truncated() {
            summary.truncated += 1;
        }

        if self.progress {
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(b".");
            let _ = stderr.flush();
        }

        let headers = match parse_message_headers(&message.content) {
            Ok(headers) => headers,
            Err(e @ ParseHeadersError::Headers(_)) => {
                summary.header_failures += 1;
                log::warn!("failed to read message {}: {}", message.index, e);
                return;
            }
            Err(e) => {
                summary.date_failures += 1;
                log::warn!("failed to date message {}: {}", message.index, e);
                return;
            }
        };

        match self.classifier.apply(&headers, &mut outcome.stats) {
            Verdict::Excluded(rule) => {
                summary.excluded += 1;
                log::debug!(
                    "message {} excluded ({}): {} contains {:?}",
                    message.index,
                    rule.reason,
                    rule.header,
                    rule.contains
                );
            }
            Verdict::Unclassifiable { header } => {
                summary.unclassifiable += 1;
                if !header.is_empty() {
                    log::warn!(
                        "failed to classify message {} - {}: {}",
                        message.index,
                        self.classifier.config().auth_header,
                        header
                    );
                }
            }
            Verdict::Classified(classification) => {
                summary.classified += 1;
                log::trace!(
                    "message {} ({}): {:?}",
                    message.index,
                    headers.message_id().unwrap_or("no Message-ID"),
                    classification
                );
            }
        }
    }
}
