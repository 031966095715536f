//! Error types for the watch loop.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from watcher setup and event delivery.
///
/// Only setup failures are fatal; anything after the watch is established
/// is logged and survived.
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Failed to initialize watcher: {reason}")]
    InitFailed { reason: String },

    #[error("Cannot watch directory {path}: {reason}")]
    PathWatchFailed { path: PathBuf, reason: String },

    #[error("Cannot create watched directory {path}: {source}")]
    CreateDirFailed {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<notify::Error> for WatchError {
    fn from(e: notify::Error) -> Self {
        WatchError::InitFailed {
            reason: e.to_string(),
        }
    }
}
