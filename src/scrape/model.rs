//! Typed model of the agent's scrape configuration.
//!
//! The document is rebuilt wholesale on every reconciliation cycle, so the
//! model is fully typed rather than a loose YAML value; `__path__` is the
//! unique key per target.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::config::AgentSettings;
use crate::fsops;

use super::ConfigError;

/// Suffix appended to a file's base name to form its job name.
const JOB_NAME_SUFFIX: &str = "-logs";

/// The complete scrape configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeConfig {
    pub server: ServerSection,
    pub positions: PositionsSection,
    pub clients: Vec<ClientSection>,
    #[serde(default)]
    pub scrape_configs: Vec<ScrapeJob>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    pub http_listen_port: u16,
    pub grpc_listen_port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionsSection {
    pub filename: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSection {
    pub url: String,
}

/// One scrape job, tailing exactly one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeJob {
    pub job_name: String,
    pub static_configs: Vec<StaticConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticConfig {
    pub targets: Vec<String>,
    pub labels: TargetLabels,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetLabels {
    pub job: String,
    #[serde(rename = "__path__")]
    pub path: PathBuf,
}

impl ScrapeJob {
    /// Build the scrape job for one log file.
    ///
    /// The job name is the file's base name suffixed with `-logs`, derived
    /// deterministically so repeated cycles agree on job identity. Returns
    /// `None` for paths without a UTF-8 base name, which cannot be expressed
    /// as a job label.
    pub fn for_file(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let job_name = format!("{name}{JOB_NAME_SUFFIX}");

        Some(Self {
            job_name: job_name.clone(),
            static_configs: vec![StaticConfig {
                targets: vec!["localhost".to_string()],
                labels: TargetLabels {
                    job: job_name,
                    path: path.to_path_buf(),
                },
            }],
        })
    }

    /// The file path this job tails, taken from the first static config.
    pub fn path(&self) -> Option<&Path> {
        self.static_configs.first().map(|sc| sc.labels.path.as_path())
    }
}

impl ScrapeConfig {
    /// Construct an empty configuration from the static agent settings.
    pub fn from_template(agent: &AgentSettings) -> Self {
        Self {
            server: ServerSection {
                http_listen_port: agent.http_listen_port,
                grpc_listen_port: agent.grpc_listen_port,
            },
            positions: PositionsSection {
                filename: agent.positions_file.clone(),
            },
            clients: vec![ClientSection {
                url: agent.push_url.clone(),
            }],
            scrape_configs: Vec::new(),
        }
    }

    /// The set of file paths currently referenced by scrape jobs.
    pub fn paths(&self) -> BTreeSet<PathBuf> {
        self.scrape_configs
            .iter()
            .filter_map(|job| job.path().map(Path::to_path_buf))
            .collect()
    }

    /// Load the configuration from disk.
    ///
    /// An absent file is the empty state (`Ok(None)`), not an error; a file
    /// that exists but does not parse is reported as corrupt.
    pub fn load(path: &Path) -> Result<Option<Self>, ConfigError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        let config = serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(Some(config))
    }

    /// Write the configuration to disk atomically.
    ///
    /// Either the write fully succeeds or the previous file remains intact.
    pub fn store(&self, path: &Path) -> Result<(), ConfigError> {
        let rendered = serde_yaml::to_string(self)?;
        fsops::write_atomic(path, &rendered).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn template() -> ScrapeConfig {
        ScrapeConfig::from_template(&AgentSettings::default())
    }

    #[test]
    fn job_name_derives_from_base_name() {
        let job = ScrapeJob::for_file(Path::new("/var/log/services/a.log")).unwrap();
        assert_eq!(job.job_name, "a.log-logs");
        assert_eq!(job.static_configs[0].labels.job, "a.log-logs");
        assert_eq!(
            job.static_configs[0].labels.path,
            PathBuf::from("/var/log/services/a.log")
        );
        assert_eq!(job.static_configs[0].targets, vec!["localhost"]);
    }

    #[test]
    fn rendered_yaml_uses_path_label_key() {
        let mut config = template();
        config
            .scrape_configs
            .push(ScrapeJob::for_file(Path::new("/var/log/services/a.log")).unwrap());

        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("__path__: /var/log/services/a.log"));
        assert!(yaml.contains("job_name: a.log-logs"));
        assert!(yaml.contains("http_listen_port: 9080"));
    }

    #[test]
    fn load_absent_file_is_empty_state() {
        let dir = TempDir::new().unwrap();
        let loaded = ScrapeConfig::load(&dir.path().join("missing.yaml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn load_corrupt_file_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server: [not, a, mapping").unwrap();

        match ScrapeConfig::load(&path) {
            Err(ConfigError::Parse { .. }) => {}
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn store_then_load_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");

        let mut config = template();
        config
            .scrape_configs
            .push(ScrapeJob::for_file(Path::new("/var/log/services/b.log")).unwrap());
        config.store(&path).unwrap();

        let loaded = ScrapeConfig::load(&path).unwrap().unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.paths().into_iter().collect::<Vec<_>>(),
            vec![PathBuf::from("/var/log/services/b.log")]
        );
    }
}
