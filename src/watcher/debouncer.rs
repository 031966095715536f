//! Event coalescing for the watch loop.
//!
//! Every reconciliation cycle re-reads the whole directory, so there is no
//! point tracking which file changed: a burst of events (log rotation,
//! service start writing several files) should collapse into one cycle.
//! The debouncer marks the directory dirty and waits for a quiet period
//! before releasing a single flush.

use std::time::{Duration, Instant};

/// Coalesces filesystem events behind a quiet period.
#[derive(Debug)]
pub struct Debouncer {
    /// Timestamp of the most recent event, while dirty.
    last_event: Option<Instant>,
    /// How long the directory must stay quiet before a flush.
    window: Duration,
}

impl Debouncer {
    /// Create a debouncer with the given quiet period in milliseconds.
    pub fn new(window_ms: u64) -> Self {
        Self {
            last_event: None,
            window: Duration::from_millis(window_ms),
        }
    }

    /// Record an event. Resets the quiet-period timer.
    pub fn record(&mut self) {
        self.last_event = Some(Instant::now());
    }

    /// Whether any events are waiting to be flushed.
    pub fn is_dirty(&self) -> bool {
        self.last_event.is_some()
    }

    /// Take the pending flush if the quiet period has elapsed.
    ///
    /// Returns true at most once per burst; the dirty flag is cleared.
    pub fn take_ready(&mut self) -> bool {
        match self.last_event {
            Some(last) if last.elapsed() >= self.window => {
                self.last_event = None;
                true
            }
            _ => false,
        }
    }
}
