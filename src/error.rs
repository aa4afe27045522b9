use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. Any of these stops the run before a report is printed.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("unable to open input file {path:?}: {source}")]
    OpenInput {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to gzip decompress archive {path:?}: {reason}")]
    Decompress { path: PathBuf, reason: String },
    #[error("unable to read rules file {path:?}: {source}")]
    RulesIo {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid rules file {path:?}: {source}")]
    RulesFormat {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("message producer failed: {0}")]
    Producer(String),
    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

pub type StatsResult<T> = Result<T, StatsError>;
