//! Reconciliation of the scrape configuration against the directory listing.
//!
//! Two policies are supported. `Mirror` rebuilds the target list from the
//! listing alone, so the configuration always matches disk exactly. `Merge`
//! consults the previously written configuration and only appends targets
//! for files it has not seen; targets whose files have disappeared are kept.
//! Merge is the default: job identity stays stable across agent restarts,
//! and a mount that is still being read is never yanked out from under the
//! agent.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::{AgentSettings, SyncSettings};

use super::model::{ScrapeConfig, ScrapeJob};
use super::ConfigError;

/// How the new target list is derived from the directory listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconcilePolicy {
    /// Full rebuild: the target list is exactly the current listing.
    Mirror,
    /// Additive merge: previous targets are kept, new files appended.
    #[default]
    Merge,
}

/// Computes and persists the scrape configuration for a directory listing.
pub struct ConfigReconciler {
    config_path: PathBuf,
    template: AgentSettings,
    policy: ReconcilePolicy,
}

impl ConfigReconciler {
    pub fn new(sync: &SyncSettings, agent: &AgentSettings) -> Self {
        Self {
            config_path: sync.config_file.clone(),
            template: agent.clone(),
            policy: sync.policy,
        }
    }

    /// Path of the configuration file this reconciler owns.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Compute the new configuration for `listing` and commit it to disk.
    ///
    /// Returns the written configuration on success. On any failure the
    /// on-disk file is left exactly as it was: a corrupt previous
    /// configuration aborts before anything is computed, and the write
    /// itself is atomic.
    pub fn reconcile(&self, listing: &[PathBuf]) -> Result<ScrapeConfig, ConfigError> {
        let jobs = match self.policy {
            ReconcilePolicy::Mirror => Self::mirror_jobs(listing),
            ReconcilePolicy::Merge => {
                let previous = ScrapeConfig::load(&self.config_path)?;
                Self::merge_jobs(previous, listing)
            }
        };

        let mut config = ScrapeConfig::from_template(&self.template);
        config.scrape_configs = jobs;
        config.store(&self.config_path)?;

        Ok(config)
    }

    /// One job per file in the listing, in listing order.
    fn mirror_jobs(listing: &[PathBuf]) -> Vec<ScrapeJob> {
        listing
            .iter()
            .filter_map(|path| ScrapeJob::for_file(path))
            .collect()
    }

    /// Previous jobs first (in their original order), then a job for every
    /// listed file not already covered. Nothing is ever pruned.
    fn merge_jobs(previous: Option<ScrapeConfig>, listing: &[PathBuf]) -> Vec<ScrapeJob> {
        let mut jobs = previous
            .map(|config| config.scrape_configs)
            .unwrap_or_default();

        let known: std::collections::BTreeSet<PathBuf> = jobs
            .iter()
            .filter_map(|job| job.path().map(Path::to_path_buf))
            .collect();

        for path in listing {
            if !known.contains(path)
                && let Some(job) = ScrapeJob::for_file(path)
            {
                jobs.push(job);
            }
        }

        jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use tempfile::TempDir;

    fn reconciler(dir: &TempDir, policy: ReconcilePolicy) -> ConfigReconciler {
        let sync = SyncSettings {
            config_file: dir.path().join("promtail-config.yaml"),
            policy,
        };
        ConfigReconciler::new(&sync, &AgentSettings::default())
    }

    fn paths(config: &ScrapeConfig) -> BTreeSet<PathBuf> {
        config.paths()
    }

    #[test]
    fn empty_listing_yields_zero_jobs() {
        let dir = TempDir::new().unwrap();
        let config = reconciler(&dir, ReconcilePolicy::Mirror)
            .reconcile(&[])
            .unwrap();
        assert!(config.scrape_configs.is_empty());
    }

    #[test]
    fn mirror_matches_listing_exactly() {
        let dir = TempDir::new().unwrap();
        let listing = vec![
            PathBuf::from("/var/log/services/a.log"),
            PathBuf::from("/var/log/services/b.log"),
        ];

        let config = reconciler(&dir, ReconcilePolicy::Mirror)
            .reconcile(&listing)
            .unwrap();

        assert_eq!(config.scrape_configs.len(), 2);
        assert_eq!(config.scrape_configs[0].job_name, "a.log-logs");
        assert_eq!(config.scrape_configs[1].job_name, "b.log-logs");
        assert_eq!(paths(&config), listing.iter().cloned().collect());
    }

    #[test]
    fn mirror_is_idempotent_on_disk() {
        let dir = TempDir::new().unwrap();
        let rec = reconciler(&dir, ReconcilePolicy::Mirror);
        let listing = vec![PathBuf::from("/var/log/services/a.log")];

        rec.reconcile(&listing).unwrap();
        let first = std::fs::read(rec.config_path()).unwrap();
        rec.reconcile(&listing).unwrap();
        let second = std::fs::read(rec.config_path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn mirror_drops_deleted_files() {
        let dir = TempDir::new().unwrap();
        let rec = reconciler(&dir, ReconcilePolicy::Mirror);

        rec.reconcile(&[
            PathBuf::from("/var/log/services/a.log"),
            PathBuf::from("/var/log/services/b.log"),
        ])
        .unwrap();
        let config = rec
            .reconcile(&[PathBuf::from("/var/log/services/b.log")])
            .unwrap();

        assert_eq!(
            paths(&config).into_iter().collect::<Vec<_>>(),
            vec![PathBuf::from("/var/log/services/b.log")]
        );
    }

    #[test]
    fn merge_appends_only_new_files() {
        let dir = TempDir::new().unwrap();
        let rec = reconciler(&dir, ReconcilePolicy::Merge);

        rec.reconcile(&[PathBuf::from("/var/log/services/a.log")])
            .unwrap();
        let config = rec
            .reconcile(&[
                PathBuf::from("/var/log/services/a.log"),
                PathBuf::from("/var/log/services/c.log"),
            ])
            .unwrap();

        let expected: BTreeSet<PathBuf> = [
            PathBuf::from("/var/log/services/a.log"),
            PathBuf::from("/var/log/services/c.log"),
        ]
        .into_iter()
        .collect();
        assert_eq!(paths(&config), expected);
        // No duplicate for a.log
        assert_eq!(config.scrape_configs.len(), 2);
    }

    #[test]
    fn merge_retains_targets_for_deleted_files() {
        let dir = TempDir::new().unwrap();
        let rec = reconciler(&dir, ReconcilePolicy::Merge);

        rec.reconcile(&[PathBuf::from("/var/log/services/a.log")])
            .unwrap();
        // a.log removed from disk: target must survive
        let config = rec.reconcile(&[]).unwrap();

        assert!(paths(&config).contains(Path::new("/var/log/services/a.log")));
    }

    #[test]
    fn merge_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let rec = reconciler(&dir, ReconcilePolicy::Merge);

        let before = rec
            .reconcile(&[PathBuf::from("/var/log/services/a.log")])
            .unwrap();
        let after = rec
            .reconcile(&[PathBuf::from("/var/log/services/b.log")])
            .unwrap();

        assert!(paths(&after).is_superset(&paths(&before)));
    }

    #[test]
    fn merge_with_no_change_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let rec = reconciler(&dir, ReconcilePolicy::Merge);
        let listing = vec![PathBuf::from("/var/log/services/a.log")];

        let first = rec.reconcile(&listing).unwrap();
        let second = rec.reconcile(&listing).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn merge_aborts_on_corrupt_previous_config() {
        let dir = TempDir::new().unwrap();
        let rec = reconciler(&dir, ReconcilePolicy::Merge);
        std::fs::write(rec.config_path(), "scrape_configs: [broken").unwrap();
        let before = std::fs::read(rec.config_path()).unwrap();

        let result = rec.reconcile(&[PathBuf::from("/var/log/services/a.log")]);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        // Nothing was written
        assert_eq!(std::fs::read(rec.config_path()).unwrap(), before);
    }

    #[test]
    fn write_failure_reports_and_leaves_no_file() {
        let dir = TempDir::new().unwrap();
        let sync = SyncSettings {
            config_file: dir.path().join("missing-dir").join("config.yaml"),
            policy: ReconcilePolicy::Mirror,
        };
        let rec = ConfigReconciler::new(&sync, &AgentSettings::default());

        let result = rec.reconcile(&[PathBuf::from("/var/log/services/a.log")]);
        assert!(matches!(result, Err(ConfigError::Write { .. })));
        assert!(!sync.config_file.exists());
    }
}
