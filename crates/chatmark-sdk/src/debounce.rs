//! Coalescing of bursty rescan triggers.
//!
//! Hosts observe their page and get a flood of change notifications while a
//! reply streams in. Rescanning and re-resolving on each one is wasteful, so
//! triggers are collapsed into at most one leading and one trailing run per
//! quiet window.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tracing::trace;

/// Which edges of a burst fire the action.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    /// Fire on the first trigger of a burst.
    Leading,
    /// Fire once the burst has been quiet for the whole window.
    Trailing,
    Both,
}

impl Edge {
    fn leading(self) -> bool {
        matches!(self, Self::Leading | Self::Both)
    }

    fn trailing(self) -> bool {
        matches!(self, Self::Trailing | Self::Both)
    }
}

/// Debounce state, driven by the caller's clock.
#[derive(Clone, Debug)]
pub struct Debouncer {
    window: Duration,
    edge: Edge,
    /// End of the current quiet window; `None` when idle.
    deadline: Option<Instant>,
    /// A trailing run is owed at `deadline`.
    pending: bool,
}

impl Debouncer {
    pub fn new(window: Duration, edge: Edge) -> Self {
        Self {
            window,
            edge,
            deadline: None,
            pending: false,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a trigger at `now`. Returns `true` if the action should run
    /// immediately.
    pub fn trigger(&mut self, now: Instant) -> bool {
        let idle = self.deadline.map_or(true, |deadline| now >= deadline);
        self.deadline = Some(now + self.window);
        if idle && self.edge.leading() {
            self.pending = false;
            true
        } else {
            self.pending = self.edge.trailing();
            false
        }
    }

    /// When the caller should next call [`poll`](Self::poll), if a trailing
    /// run is owed.
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.pending {
            self.deadline
        } else {
            None
        }
    }

    /// Returns `true` if the owed trailing run is due at `now`.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if self.pending && now >= deadline => {
                self.pending = false;
                true
            }
            _ => false,
        }
    }

    /// Take an owed trailing run regardless of the clock. Used on shutdown.
    pub fn flush(&mut self) -> bool {
        std::mem::take(&mut self.pending)
    }
}

/// Run `action` for each burst of messages on `triggers`, per `debouncer`.
///
/// Returns once every sender is dropped, after running any owed trailing
/// action.
pub async fn run_debounced<T, F>(
    mut triggers: mpsc::Receiver<T>,
    mut debouncer: Debouncer,
    mut action: F,
) where
    F: FnMut(),
{
    let mut runs = 0u64;
    loop {
        let deadline = debouncer.next_deadline();
        tokio::select! {
            msg = triggers.recv() => match msg {
                Some(_) => {
                    if debouncer.trigger(Instant::now()) {
                        runs += 1;
                        trace!(runs, "debounced action (leading)");
                        action();
                    }
                }
                None => {
                    if debouncer.flush() {
                        trace!("debounced action (flush)");
                        action();
                    }
                    break;
                }
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if debouncer.poll(Instant::now()) {
                    runs += 1;
                    trace!(runs, "debounced action (trailing)");
                    action();
                }
            }
        }
    }
}
