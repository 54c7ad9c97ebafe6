//! Fatal engine errors.
//!
//! Only conditions that abort a whole batch live here. Everything scoped to a
//! single target (name not found, bad signature, missing subtest structure) is
//! reported as data in the batch report instead, so one bad target never sinks
//! the rest — see [`crate::report::FailureReason`].

use std::path::PathBuf;

use thiserror::Error;

/// Errors that abort an entire quarantine/unquarantine batch.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("root directory does not exist or is not a directory: {0}")]
    RootNotFound(PathBuf),

    #[error("no Go modules found under {0} (no go.mod)")]
    NoModules(PathBuf),

    #[error("malformed go.mod at {path}: {message}")]
    ModFile { path: PathBuf, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    /// Attach a path to a raw I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}
