//! Auditable, cancellable units of work and the bounded log that holds them.

mod cancel;
mod entry;
mod history;

pub use cancel::CancellationToken;
pub use entry::{EntryKind, EntryState, TimelineEntry, TimelineEntrySnapshot};
pub use history::{TimelineHistory, DEFAULT_CAPACITY};
