//! Deployment manifest reconciliation.
//!
//! The manifest is a docker-compose-style document. Only
//! `services.<name>.volumes` is rewritten; every other field round-trips
//! through an untyped [`serde_yaml::Value`] untouched. The merge is
//! additive-only: mounts for files no longer scraped stay in place, since
//! the agent may still hold them open.

mod error;

pub use error::ManifestError;

use serde_yaml::Value;
use std::path::{Path, PathBuf};

use crate::config::ManifestSettings;
use crate::fsops;
use crate::scrape::ScrapeConfig;

/// Merges scrape-target bind mounts into the deployment manifest.
pub struct ManifestReconciler {
    manifest_path: PathBuf,
    service: String,
}

impl ManifestReconciler {
    pub fn new(settings: &ManifestSettings) -> Self {
        Self {
            manifest_path: settings.file.clone(),
            service: settings.service.clone(),
        }
    }

    /// Path of the manifest file this reconciler owns.
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// Ensure every path in `config` is bind-mounted into the service.
    ///
    /// Each path becomes a `"<path>:<path>"` entry (identical host and
    /// container paths, so the agent sees the same `__path__` it scrapes).
    /// Existing volume entries keep their order; new mounts are appended in
    /// sorted path order. On any failure the on-disk manifest is unchanged.
    pub fn reconcile(&self, config: &ScrapeConfig) -> Result<(), ManifestError> {
        let contents =
            std::fs::read_to_string(&self.manifest_path).map_err(|e| ManifestError::Read {
                path: self.manifest_path.clone(),
                source: e,
            })?;

        let mut manifest: Value =
            serde_yaml::from_str(&contents).map_err(|e| ManifestError::Parse {
                path: self.manifest_path.clone(),
                source: e,
            })?;

        let added = self.merge_volumes(&mut manifest, config)?;
        if added == 0 {
            crate::debug_event!("manifest", "volumes already up to date");
            return Ok(());
        }

        let rendered = serde_yaml::to_string(&manifest)?;
        fsops::write_atomic(&self.manifest_path, &rendered).map_err(|e| ManifestError::Write {
            path: self.manifest_path.clone(),
            source: e,
        })?;

        crate::log_event!("manifest", "mounts added", "{added}");
        Ok(())
    }

    /// Union the required mount strings into the service's volume list.
    ///
    /// Returns how many entries were appended.
    fn merge_volumes(&self, manifest: &mut Value, config: &ScrapeConfig) -> Result<usize, ManifestError> {
        let service = manifest
            .get_mut("services")
            .and_then(|s| s.get_mut(&self.service))
            .ok_or_else(|| ManifestError::ServiceMissing {
                service: self.service.clone(),
            })?;

        let service_map = service
            .as_mapping_mut()
            .ok_or_else(|| ManifestError::Malformed {
                reason: format!("service '{}' is not a mapping", self.service),
            })?;

        let volumes = service_map
            .entry(Value::from("volumes"))
            .or_insert_with(|| Value::Sequence(Vec::new()));
        let volumes = volumes
            .as_sequence_mut()
            .ok_or_else(|| ManifestError::Malformed {
                reason: format!("'volumes' of service '{}' is not a list", self.service),
            })?;

        let existing: std::collections::BTreeSet<String> = volumes
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();

        let mut added = 0;
        for path in config.paths() {
            let mount = format!("{p}:{p}", p = path.display());
            if !existing.contains(&mount) {
                volumes.push(Value::from(mount));
                added += 1;
            }
        }

        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AgentSettings;
    use crate::scrape::ScrapeJob;
    use tempfile::TempDir;

    const MANIFEST: &str = "\
services:
  promtail:
    image: grafana/promtail:2.9.0
    environment:
      - TZ=UTC
    ports:
      - \"9080:9080\"
    volumes:
      - /etc/promtail:/etc/promtail
  loki:
    image: grafana/loki:2.9.0
";

    fn write_manifest(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(&path, MANIFEST).unwrap();
        path
    }

    fn reconciler(path: &Path) -> ManifestReconciler {
        ManifestReconciler::new(&ManifestSettings {
            file: path.to_path_buf(),
            service: "promtail".to_string(),
        })
    }

    fn config_with(paths: &[&str]) -> ScrapeConfig {
        let mut config = ScrapeConfig::from_template(&AgentSettings::default());
        for p in paths {
            config.scrape_configs.push(ScrapeJob::for_file(Path::new(p)).unwrap());
        }
        config
    }

    fn volumes_of(path: &Path) -> Vec<String> {
        let manifest: Value =
            serde_yaml::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        manifest["services"]["promtail"]["volumes"]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn mounts_cover_every_scraped_path() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir);

        let config = config_with(&["/var/log/services/a.log", "/var/log/services/b.log"]);
        reconciler(&path).reconcile(&config).unwrap();

        let volumes = volumes_of(&path);
        for p in config.paths() {
            let mount = format!("{p}:{p}", p = p.display());
            assert!(volumes.contains(&mount), "missing mount {mount}");
        }
    }

    #[test]
    fn existing_entries_and_other_fields_survive() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir);

        reconciler(&path)
            .reconcile(&config_with(&["/var/log/services/a.log"]))
            .unwrap();

        let volumes = volumes_of(&path);
        assert_eq!(volumes[0], "/etc/promtail:/etc/promtail");

        let manifest: Value =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            manifest["services"]["promtail"]["image"].as_str(),
            Some("grafana/promtail:2.9.0")
        );
        assert_eq!(
            manifest["services"]["loki"]["image"].as_str(),
            Some("grafana/loki:2.9.0")
        );
        assert!(manifest["services"]["promtail"]["ports"].is_sequence());
    }

    #[test]
    fn rerun_adds_no_duplicates() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir);
        let rec = reconciler(&path);
        let config = config_with(&["/var/log/services/a.log"]);

        rec.reconcile(&config).unwrap();
        let first = volumes_of(&path);
        rec.reconcile(&config).unwrap();
        let second = volumes_of(&path);

        assert_eq!(first, second);
    }

    #[test]
    fn stale_mounts_are_kept() {
        let dir = TempDir::new().unwrap();
        let path = write_manifest(&dir);
        let rec = reconciler(&path);

        rec.reconcile(&config_with(&["/var/log/services/a.log"]))
            .unwrap();
        // a.log no longer scraped
        rec.reconcile(&config_with(&["/var/log/services/b.log"]))
            .unwrap();

        let volumes = volumes_of(&path);
        assert!(volumes.contains(&"/var/log/services/a.log:/var/log/services/a.log".to_string()));
        assert!(volumes.contains(&"/var/log/services/b.log:/var/log/services/b.log".to_string()));
    }

    #[test]
    fn missing_service_section_fails_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(&path, "services:\n  loki:\n    image: grafana/loki:2.9.0\n").unwrap();
        let before = std::fs::read(&path).unwrap();

        let result = reconciler(&path).reconcile(&config_with(&["/var/log/services/a.log"]));
        assert!(matches!(result, Err(ManifestError::ServiceMissing { .. })));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn unparseable_manifest_fails_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(&path, "services: [oops").unwrap();
        let before = std::fs::read(&path).unwrap();

        let result = reconciler(&path).reconcile(&config_with(&["/var/log/services/a.log"]));
        assert!(matches!(result, Err(ManifestError::Parse { .. })));
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn absent_volumes_list_is_created() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("docker-compose.yml");
        std::fs::write(
            &path,
            "services:\n  promtail:\n    image: grafana/promtail:2.9.0\n",
        )
        .unwrap();

        reconciler(&path)
            .reconcile(&config_with(&["/var/log/services/a.log"]))
            .unwrap();

        assert_eq!(
            volumes_of(&path),
            vec!["/var/log/services/a.log:/var/log/services/a.log".to_string()]
        );
    }
}
