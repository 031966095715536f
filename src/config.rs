//! Configuration module for the scrape-config synchronizer.
//!
//! Provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file (`scrapesync.toml`)
//! - Environment variable overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SCRAPESYNC_` and use double
//! underscores to separate nested levels:
//! - `SCRAPESYNC_WATCH__LOGS_DIR=/var/log/apps` sets `watch.logs_dir`
//! - `SCRAPESYNC_MANIFEST__SERVICE=promtail` sets `manifest.service`
//! - `SCRAPESYNC_SYNC__POLICY=mirror` sets `sync.policy`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::scrape::ReconcilePolicy;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "scrapesync.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Watched-directory settings
    #[serde(default)]
    pub watch: WatchSettings,

    /// Scrape-configuration output settings
    #[serde(default)]
    pub sync: SyncSettings,

    /// Static agent template values embedded in every generated configuration
    #[serde(default)]
    pub agent: AgentSettings,

    /// Deployment manifest settings
    #[serde(default)]
    pub manifest: ManifestSettings,

    /// Service reload settings
    #[serde(default)]
    pub reload: ReloadSettings,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchSettings {
    /// Directory monitored for log files (non-recursive)
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Quiet period after the last filesystem event before a sync cycle runs
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncSettings {
    /// Path of the generated scrape configuration
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,

    /// Reconciliation policy: `merge` keeps targets for files that have
    /// disappeared, `mirror` rebuilds the target list from disk every cycle
    #[serde(default)]
    pub policy: ReconcilePolicy,
}

/// Static server/transport values for the generated configuration.
///
/// These were process-wide constants in earlier revisions; they are now
/// explicit configuration so two instances can ship to different endpoints.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AgentSettings {
    #[serde(default = "default_http_listen_port")]
    pub http_listen_port: u16,

    #[serde(default)]
    pub grpc_listen_port: u16,

    /// Positions file the agent uses to track read offsets
    #[serde(default = "default_positions_file")]
    pub positions_file: PathBuf,

    /// Push endpoint the agent ships log lines to
    #[serde(default = "default_push_url")]
    pub push_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ManifestSettings {
    /// Path of the deployment manifest whose volumes are reconciled
    #[serde(default = "default_manifest_file")]
    pub file: PathBuf,

    /// Service entry in the manifest that receives the bind mounts
    #[serde(default = "default_service")]
    pub service: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ReloadSettings {
    /// Command invoked to restart the service, with the service name
    /// appended as the final argument
    #[serde(default = "default_reload_command")]
    pub command: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_logs_dir() -> PathBuf {
    PathBuf::from("/var/log/services")
}
fn default_debounce_ms() -> u64 {
    500
}
fn default_config_file() -> PathBuf {
    PathBuf::from("/etc/promtail/promtail-config.yaml")
}
fn default_http_listen_port() -> u16 {
    9080
}
fn default_positions_file() -> PathBuf {
    PathBuf::from("/tmp/positions.yaml")
}
fn default_push_url() -> String {
    "http://loki:3100/loki/api/v1/push".to_string()
}
fn default_manifest_file() -> PathBuf {
    PathBuf::from("docker-compose.yml")
}
fn default_service() -> String {
    "promtail".to_string()
}
fn default_reload_command() -> Vec<String> {
    vec![
        "docker".to_string(),
        "compose".to_string(),
        "restart".to_string(),
    ]
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            watch: WatchSettings::default(),
            sync: SyncSettings::default(),
            agent: AgentSettings::default(),
            manifest: ManifestSettings::default(),
            reload: ReloadSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            logs_dir: default_logs_dir(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            policy: ReconcilePolicy::default(),
        }
    }
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            http_listen_port: default_http_listen_port(),
            grpc_listen_port: 0,
            positions_file: default_positions_file(),
            push_url: default_push_url(),
        }
    }
}

impl Default for ManifestSettings {
    fn default() -> Self {
        Self {
            file: default_manifest_file(),
            service: default_service(),
        }
    }
}

impl Default for ReloadSettings {
    fn default() -> Self {
        Self {
            command: default_reload_command(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources.
    ///
    /// Reads `scrapesync.toml` from the working directory if present, then
    /// layers `SCRAPESYNC_`-prefixed environment variables on top.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::load_from(PathBuf::from(CONFIG_FILE_NAME))
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<std::path::Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path))
            // Layer in environment variables with SCRAPESYNC_ prefix.
            // Double underscore becomes a dot; single underscores remain
            // part of the field name.
            .merge(
                Env::prefixed("SCRAPESYNC_")
                    .map(|key| key.as_str().to_lowercase().replace("__", ".").into()),
            )
            .extract()
            .map_err(Box::new)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<std::path::Path>) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file in the working directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = PathBuf::from(CONFIG_FILE_NAME);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        let settings = Settings::default();
        settings.save(&config_path)?;

        Ok(config_path)
    }
}
