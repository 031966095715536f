//! Error types for scrape-configuration handling.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading, reconciling, or writing the scrape configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read scrape configuration {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Scrape configuration {path} is corrupt: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize scrape configuration: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("Failed to write scrape configuration {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
