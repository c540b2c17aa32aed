use std::path::PathBuf;
use thiserror::Error;

/// Per-file processing failures. None of these abort the overall run: the
/// caller logs, skips or substitutes an empty record and moves on.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model invocation failed for {path}: {message}")]
    ModelInvocation { path: PathBuf, message: String },

    #[error("cache i/o failed: {0}")]
    CacheIo(String),
}
