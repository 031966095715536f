//! Directory watcher driving the reconciliation pipeline.
//!
//! A single `notify::RecommendedWatcher` feeds filesystem events through a
//! channel into one consumer loop. Events are coalesced behind a quiet
//! period; every flush runs the whole pipeline once:
//!
//! ```text
//! notify thread ──channel──> WatchController
//!                               IDLE ─event─> PROCESSING ─> IDLE
//!                               (pipeline: config -> manifest -> reload)
//! ```
//!
//! One event loop, one in-flight cycle at a time. Stage failures are logged
//! and the controller returns to IDLE for the next event.

mod controller;
mod debouncer;
mod error;

pub use controller::{ControllerState, WatchController};
pub use debouncer::Debouncer;
pub use error::WatchError;
