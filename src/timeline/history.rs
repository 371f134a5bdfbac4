use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use crate::accessors::Clock;
use crate::error::{Error, Result};

use super::cancel::CancellationToken;
use super::entry::{EntryKind, EntryState, TimelineEntry, TimelineEntrySnapshot};

/// Default number of entries kept before the oldest are evicted.
pub const DEFAULT_CAPACITY: usize = 100;

/// Bounded, append-only log of timeline entries.
///
/// The orchestrator is the single writer; observers read snapshots. Appending
/// past capacity evicts the oldest entry.
pub struct TimelineHistory {
    capacity: usize,
    entries: RwLock<VecDeque<TimelineEntry>>,
    clock: Arc<dyn Clock>,
}

impl TimelineHistory {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("timeline lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push(&self, entry: TimelineEntry) {
        let mut entries = self.entries.write().expect("timeline lock poisoned");
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Append a terminal informational entry.
    pub fn push_message(&self, text: impl Into<String>) -> TimelineEntry {
        let text = text.into();
        tracing::info!("{}", text);
        let entry = TimelineEntry::completed(EntryKind::Message, text, self.clock.now());
        self.push(entry.clone());
        entry
    }

    /// Record a failure as a readable entry carrying the error message.
    pub fn push_error(&self, error: &Error) -> TimelineEntry {
        let entry = TimelineEntry::running(
            EntryKind::Error,
            format!("Error occurred: {}", error),
            self.clock.now(),
        );
        entry.finish(EntryState::Failed, self.clock.now());
        self.push(entry.clone());
        entry
    }

    /// Handles to the current entries, oldest first.
    pub fn entries(&self) -> Vec<TimelineEntry> {
        self.entries
            .read()
            .expect("timeline lock poisoned")
            .iter()
            .cloned()
            .collect()
    }

    /// Point-in-time copy of every entry, oldest first.
    pub fn snapshot(&self) -> Vec<TimelineEntrySnapshot> {
        self.entries().iter().map(TimelineEntry::snapshot).collect()
    }

    pub fn clear(&self) {
        self.entries.write().expect("timeline lock poisoned").clear();
    }

    /// Run `work` as a new timeline entry.
    ///
    /// The entry is appended before the work starts. Returns `Ok(Some(_))` on
    /// success and `Ok(None)` if `cancel` fired first, in which case the work
    /// future is dropped at its current await point. Errors mark the entry
    /// failed and are returned to the caller, who records them.
    pub async fn run<T, F, Fut>(
        &self,
        kind: EntryKind,
        text: impl Into<String>,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce(TimelineEntry) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let entry = TimelineEntry::running(kind, text, self.clock.now());
        self.push(entry.clone());

        if cancel.is_cancelled() {
            entry.finish(EntryState::Cancelled, self.clock.now());
            return Ok(None);
        }

        let work = work(entry.clone());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("{} cancelled", entry.kind().as_str());
                entry.append_line("Cancelled");
                entry.finish(EntryState::Cancelled, self.clock.now());
                Ok(None)
            }
            result = work => match result {
                Ok(value) => {
                    entry.finish(EntryState::Completed, self.clock.now());
                    Ok(Some(value))
                }
                Err(e) => {
                    entry.finish(EntryState::Failed, self.clock.now());
                    Err(e)
                }
            }
        }
    }

    /// Cancellable timed wait, reported as a `Wait` entry with progress.
    ///
    /// Returns `false` if the wait was cut short by cancellation.
    pub async fn wait(&self, timeout: Duration, cancel: &CancellationToken) -> bool {
        let text = format!("Waiting {}s before the next cycle", timeout.as_secs());
        let kind = EntryKind::Wait {
            seconds: timeout.as_secs(),
        };
        let outcome = self
            .run(kind, text, cancel, |entry| async move {
                let started = tokio::time::Instant::now();
                let tick = Duration::from_secs(1).min(timeout.max(Duration::from_millis(1)));
                entry.set_progress(0.0);
                loop {
                    let elapsed = started.elapsed();
                    if elapsed >= timeout {
                        break;
                    }
                    tokio::time::sleep(tick.min(timeout - elapsed)).await;
                    let ratio = started.elapsed().as_secs_f32() / timeout.as_secs_f32().max(f32::EPSILON);
                    entry.set_progress(ratio * 100.0);
                }
                Ok(())
            })
            .await;
        matches!(outcome, Ok(Some(())))
    }
}
