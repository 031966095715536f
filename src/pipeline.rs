//! The reconciliation pipeline: listing → config → manifest → reload.
//!
//! Stages run strictly in order and a failure at any stage skips everything
//! downstream, so a cycle can never reload the service against a
//! half-written configuration. Writes already committed by earlier stages
//! stand: if the manifest stage fails, the scrape configuration from this
//! cycle remains on disk and the next cycle picks up from there.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::Settings;
use crate::fsops;
use crate::manifest::{ManifestError, ManifestReconciler};
use crate::reload::{ComposeReload, ReloadError, ReloadTrigger};
use crate::scrape::{ConfigError, ConfigReconciler};

/// A failed pipeline stage.
///
/// Stage failures are reported, never retried; the next filesystem event is
/// the recovery path.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cannot list watched directory {path}: {source}")]
    List {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Reload(#[from] ReloadError),
}

/// Result of one successful reconciliation cycle.
#[derive(Debug, Clone, Copy)]
pub struct CycleOutcome {
    /// Number of scrape jobs in the written configuration.
    pub jobs: usize,
}

/// Owns the three pipeline stages and runs them as one cycle.
pub struct SyncPipeline {
    logs_dir: PathBuf,
    service: String,
    config: ConfigReconciler,
    manifest: ManifestReconciler,
    reload: Box<dyn ReloadTrigger>,
}

impl SyncPipeline {
    /// Assemble the pipeline from settings, with the real compose trigger.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(
            settings,
            Box::new(ComposeReload::new(&settings.reload, &settings.manifest)),
        )
    }

    /// Assemble the pipeline with a caller-supplied reload trigger.
    pub fn new(settings: &Settings, reload: Box<dyn ReloadTrigger>) -> Self {
        Self {
            logs_dir: settings.watch.logs_dir.clone(),
            service: settings.manifest.service.clone(),
            config: ConfigReconciler::new(&settings.sync, &settings.agent),
            manifest: ManifestReconciler::new(&settings.manifest),
            reload,
        }
    }

    /// Run one full cycle against the current directory contents.
    pub async fn run_cycle(&self) -> Result<CycleOutcome, SyncError> {
        let listing = fsops::list_regular_files(&self.logs_dir).map_err(|e| SyncError::List {
            path: self.logs_dir.clone(),
            source: e,
        })?;

        let config = self.config.reconcile(&listing)?;
        let jobs = config.scrape_configs.len();
        crate::log_event!("sync", "config written", "{jobs} scrape jobs");

        self.manifest.reconcile(&config)?;
        self.reload.reload(&self.service).await?;

        Ok(CycleOutcome { jobs })
    }
}
