//! Error types shared by the probe engine and the persistence layer.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while executing a single probe.
///
/// None of these escape the orchestrator: each one is folded into the
/// probe's `ProbeResult` as an `Error` outcome.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("network request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("unexpected response from {url}: {reason}")]
    BadResponse { url: String, reason: String },

    #[error("worker task ended abnormally: {0}")]
    Worker(String),
}

/// Errors raised by the settings store and the results writer.
///
/// Callers log these and degrade to a no-op; they never end the session.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("duplicate result for probe '{0}'")]
    DuplicateProbe(String),
}
