//! Scrape configuration: data model, codec, and reconciliation.
//!
//! The generated document mirrors the agent's expected layout:
//!
//! ```yaml
//! server:
//!   http_listen_port: 9080
//!   grpc_listen_port: 0
//! positions:
//!   filename: /tmp/positions.yaml
//! clients:
//!   - url: http://loki:3100/loki/api/v1/push
//! scrape_configs:
//!   - job_name: app.log-logs
//!     static_configs:
//!       - targets: [localhost]
//!         labels:
//!           job: app.log-logs
//!           __path__: /var/log/services/app.log
//! ```

mod error;
mod model;
mod reconciler;

pub use error::ConfigError;
pub use model::{
    ClientSection, PositionsSection, ScrapeConfig, ScrapeJob, ServerSection, StaticConfig,
    TargetLabels,
};
pub use reconciler::{ConfigReconciler, ReconcilePolicy};
