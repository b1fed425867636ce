//! Error types for acquisition, persistence and fusion

use std::path::PathBuf;

use thiserror::Error;

/// A single poll of the instrument failed. Never fatal, the poller tries again next tick.
#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("request to instrument failed: {0}")]
    Request(String),
    #[error("malformed response from instrument: {0}")]
    Malformed(String),
}

/// Writing or reading back checkpointed readings failed
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to serialize readings: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("unable to parse readings from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("consolidated chunks could not be removed and would be merged twice: {paths:?}")]
    Leftover { paths: Vec<PathBuf> },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures of the offline track/readings fusion
#[derive(Error, Debug)]
pub enum FusionError {
    #[error("malformed input {path}: {reason}")]
    MalformedInput { path: PathBuf, reason: String },
    #[error("no readings to correlate against")]
    EmptyInput,
    #[error("unable to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FusionError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::MalformedInput {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
