pub mod config;
pub mod fsops;
pub mod logging;
pub mod manifest;
pub mod pipeline;
pub mod reload;
pub mod scrape;
pub mod watcher;

pub use config::Settings;
pub use manifest::ManifestReconciler;
pub use pipeline::{CycleOutcome, SyncError, SyncPipeline};
pub use reload::{ComposeReload, ReloadTrigger};
pub use scrape::{ConfigReconciler, ReconcilePolicy, ScrapeConfig};
pub use watcher::WatchController;
