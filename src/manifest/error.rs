//! Error types for deployment manifest handling.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading, reconciling, or writing the deployment manifest.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Cannot read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Manifest {path} is not valid YAML: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Service '{service}' not found in manifest")]
    ServiceMissing { service: String },

    #[error("Manifest structure unexpected: {reason}")]
    Malformed { reason: String },

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Failed to write manifest {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
