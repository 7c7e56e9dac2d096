//! Errors surfaced by the collector framework and the summary store.
//!
//! Per-collector and per-post failures are logged where they happen and
//! never reach this type. Anything that lands here means the run cannot
//! trust its dedup or durability guarantees and should stop.

use std::path::PathBuf;

/// Boxed error returned by site collectors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Two registered collectors report the same name.
    #[error("duplicate collector name: {0}")]
    DuplicateCollector(String),

    /// A collector failed its one-time initialization.
    #[error("initialize collector {collector} failed: {source}")]
    Initialize {
        collector: String,
        #[source]
        source: BoxError,
    },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A historical segment line could not be decoded.
    #[error("decode {}:{line} failed: {source}", path.display())]
    Decode {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("encode summary result failed: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
