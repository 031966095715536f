//! The watch controller: notify events in, pipeline cycles out.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tokio_util::sync::CancellationToken;

use crate::pipeline::SyncPipeline;

use super::debouncer::Debouncer;
use super::error::WatchError;

/// How often the loop checks for an elapsed quiet period.
const TICK_MS: u64 = 100;

/// Controller lifecycle. PROCESSING is never concurrent: the loop runs one
/// pipeline cycle to completion before looking at the channel again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Processing,
    Stopped,
}

/// Owns the event loop that drives the reconciliation pipeline.
pub struct WatchController {
    pipeline: SyncPipeline,
    watch_dir: PathBuf,
    debouncer: Debouncer,
    event_rx: mpsc::Receiver<notify::Result<Event>>,
    /// Kept alive for the lifetime of the loop; dropping it stops delivery.
    _watcher: notify::RecommendedWatcher,
    shutdown: CancellationToken,
    state: ControllerState,
}

impl WatchController {
    /// Set up the notify watcher on `watch_dir` (created if absent) and
    /// bridge its callback into a channel for the single consumer loop.
    pub fn new(
        pipeline: SyncPipeline,
        watch_dir: PathBuf,
        debounce_ms: u64,
        shutdown: CancellationToken,
    ) -> Result<Self, WatchError> {
        if !watch_dir.exists() {
            std::fs::create_dir_all(&watch_dir).map_err(|e| WatchError::CreateDirFailed {
                path: watch_dir.clone(),
                source: e,
            })?;
            crate::log_event!("watcher", "created directory", "{}", watch_dir.display());
        }

        let (tx, rx) = mpsc::channel(100);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let _ = tx.blocking_send(res);
        })?;

        watcher
            .watch(&watch_dir, RecursiveMode::NonRecursive)
            .map_err(|e| WatchError::PathWatchFailed {
                path: watch_dir.clone(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            pipeline,
            watch_dir,
            debouncer: Debouncer::new(debounce_ms),
            event_rx: rx,
            _watcher: watcher,
            shutdown,
            state: ControllerState::Idle,
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Run the event loop until the shutdown token fires.
    ///
    /// Starts with one full cycle so the configuration catches up with
    /// changes made while the watcher was down, then processes events:
    /// any create/modify/delete on a non-directory entry marks the
    /// directory dirty, and a quiet period later one cycle runs. Stage
    /// failures are logged and the loop keeps going. Shutdown is observed
    /// between cycles, never mid-stage.
    pub async fn run(mut self) -> ControllerState {
        crate::log_event!("watcher", "watching", "{}", self.watch_dir.display());

        self.process_cycle().await;

        loop {
            let tick = sleep(Duration::from_millis(TICK_MS));
            tokio::pin!(tick);

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    break;
                }

                maybe = self.event_rx.recv() => {
                    match maybe {
                        Some(Ok(event)) => self.handle_event(event),
                        Some(Err(e)) => {
                            tracing::error!("[watcher] event delivery error: {e}");
                        }
                        None => {
                            tracing::error!("[watcher] event channel closed");
                            break;
                        }
                    }
                }

                _ = &mut tick => {
                    if self.debouncer.take_ready() {
                        self.process_cycle().await;
                    }
                }
            }
        }

        self.state = ControllerState::Stopped;
        crate::log_event!("watcher", "stopped");
        self.state
    }

    /// Record a filesystem event if it is relevant to the watched directory.
    fn handle_event(&mut self, event: Event) {
        let relevant = matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        );
        if !relevant {
            return;
        }

        // Subdirectory churn is not a scrape-target change. Removed entries
        // cannot be stat'ed anymore; a spurious cycle for a removed
        // directory is harmless since every cycle re-lists from scratch.
        if !matches!(event.kind, EventKind::Remove(_))
            && event.paths.iter().all(|p| Self::is_directory(p))
        {
            crate::debug_event!("watcher", "ignored directory event", "{:?}", event.kind);
            return;
        }

        for path in &event.paths {
            crate::debug_event!("watcher", "change", "{:?} {}", event.kind, path.display());
        }
        self.debouncer.record();
    }

    fn is_directory(path: &Path) -> bool {
        std::fs::metadata(path).map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Run one pipeline cycle, IDLE -> PROCESSING -> IDLE.
    async fn process_cycle(&mut self) {
        self.state = ControllerState::Processing;

        match self.pipeline.run_cycle().await {
            Ok(outcome) => {
                crate::log_event!("sync", "cycle complete", "{} scrape jobs", outcome.jobs);
            }
            Err(e) => {
                // Downstream stages were skipped; wait for the next event
                tracing::error!("[sync] cycle failed: {e}");
            }
        }

        self.state = ControllerState::Idle;
    }
}
