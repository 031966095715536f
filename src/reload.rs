//! Service reload via the external orchestration command.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::{ManifestSettings, ReloadSettings};

/// Errors from invoking the reload command.
#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("Reload command is empty")]
    EmptyCommand,

    #[error("Failed to launch '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("Reload of '{service}' exited with {status}")]
    Failed {
        service: String,
        status: std::process::ExitStatus,
    },
}

/// Restarts the downstream service after a successful reconciliation.
///
/// A trait seam so the watch pipeline can be exercised in tests with a
/// recording fake instead of a real orchestration tool.
#[async_trait]
pub trait ReloadTrigger: Send + Sync {
    /// Restart the named service. Success means a zero exit status.
    async fn reload(&self, service: &str) -> Result<(), ReloadError>;
}

/// Runs the configured orchestration command (`docker compose restart` by
/// default) with the manifest's directory as working directory.
pub struct ComposeReload {
    command: Vec<String>,
    working_dir: PathBuf,
}

impl ComposeReload {
    pub fn new(reload: &ReloadSettings, manifest: &ManifestSettings) -> Self {
        // The orchestration tool resolves the manifest relative to its
        // working directory, so run it from the manifest's parent.
        let working_dir = manifest
            .file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            command: reload.command.clone(),
            working_dir,
        }
    }
}

#[async_trait]
impl ReloadTrigger for ComposeReload {
    async fn reload(&self, service: &str) -> Result<(), ReloadError> {
        let (program, args) = self.command.split_first().ok_or(ReloadError::EmptyCommand)?;

        let status = tokio::process::Command::new(program)
            .args(args)
            .arg(service)
            .current_dir(&self.working_dir)
            .status()
            .await
            .map_err(|e| ReloadError::Spawn {
                command: program.clone(),
                source: e,
            })?;

        if !status.success() {
            return Err(ReloadError::Failed {
                service: service.to_string(),
                status,
            });
        }

        crate::log_event!("reload", "restarted", "{service}");
        Ok(())
    }
}
