use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which stage an entry belongs to.
///
/// The history stores every entry through the same [`TimelineEntry`] type;
/// the kind only tags what the entry's work was.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryKind {
    /// Informational line (loop start/stop, cycle boundaries, decisions).
    Message,
    Refresh,
    ModelSelection,
    Predict,
    Changeset,
    CreateDataset,
    PreTraining,
    Training,
    CloudExport,
    UpdateTool,
    Wait { seconds: u64 },
    CreateTask,
    Error,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Refresh => "refresh",
            Self::ModelSelection => "model_selection",
            Self::Predict => "predict",
            Self::Changeset => "changeset",
            Self::CreateDataset => "create_dataset",
            Self::PreTraining => "pre_training",
            Self::Training => "training",
            Self::CloudExport => "cloud_export",
            Self::UpdateTool => "update_tool",
            Self::Wait { .. } => "wait",
            Self::CreateTask => "create_task",
            Self::Error => "error",
        }
    }
}

/// Lifecycle state of an entry.
///
/// - `Running`: work is in progress
/// - `Completed`: work finished and produced a result
/// - `Cancelled`: a stop was requested before the work finished
/// - `Failed`: the work returned an error
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl EntryState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// Point-in-time copy of an entry, handed to observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEntrySnapshot {
    pub id: Uuid,
    #[serde(flatten)]
    pub kind: EntryKind,
    pub state: EntryState,
    pub text: String,
    /// 0-100 while progress is known, absent otherwise.
    pub progress: Option<u8>,
    pub images: Vec<PathBuf>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct EntryData {
    text: String,
    progress: Option<u8>,
    images: Vec<PathBuf>,
    state: EntryState,
    finished_at: Option<DateTime<Utc>>,
}

/// A unit of auditable work on the timeline.
///
/// Cloning yields another handle to the same entry: the history keeps one and
/// the task doing the work keeps another to report progress and status text.
#[derive(Debug, Clone)]
pub struct TimelineEntry {
    id: Uuid,
    kind: EntryKind,
    created_at: DateTime<Utc>,
    data: Arc<RwLock<EntryData>>,
}

impl TimelineEntry {
    /// A new entry in the `Running` state with no progress.
    pub fn running(kind: EntryKind, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            created_at: now,
            data: Arc::new(RwLock::new(EntryData {
                text: text.into(),
                progress: None,
                images: Vec::new(),
                state: EntryState::Running,
                finished_at: None,
            })),
        }
    }

    /// An entry that is terminal from the start, e.g. an informational message.
    pub fn completed(kind: EntryKind, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        let entry = Self::running(kind, text, now);
        entry.finish(EntryState::Completed, now);
        entry
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> EntryState {
        self.read().state
    }

    pub fn text(&self) -> String {
        self.read().text.clone()
    }

    pub fn progress(&self) -> Option<u8> {
        self.read().progress
    }

    pub fn set_text(&self, text: impl Into<String>) {
        self.write().text = text.into();
    }

    /// Append a status line below the current text.
    pub fn append_line(&self, line: impl AsRef<str>) {
        let mut data = self.write();
        if !data.text.is_empty() {
            data.text.push('\n');
        }
        data.text.push_str(line.as_ref());
    }

    /// Report progress; values outside `0..=100` are clamped.
    pub fn set_progress(&self, percent: f32) {
        let percent = if percent.is_nan() {
            0.0
        } else {
            percent.clamp(0.0, 100.0)
        };
        self.write().progress = Some(percent.round() as u8);
    }

    pub fn add_image(&self, image: impl Into<PathBuf>) {
        self.write().images.push(image.into());
    }

    /// Move to a terminal state. The first terminal state wins.
    pub fn finish(&self, state: EntryState, now: DateTime<Utc>) {
        let mut data = self.write();
        if data.state.is_terminal() {
            return;
        }
        data.state = state;
        data.progress = None;
        data.finished_at = Some(now);
    }

    pub fn snapshot(&self) -> TimelineEntrySnapshot {
        let data = self.read();
        TimelineEntrySnapshot {
            id: self.id,
            kind: self.kind.clone(),
            state: data.state,
            text: data.text.clone(),
            progress: data.progress,
            images: data.images.clone(),
            created_at: self.created_at,
            finished_at: data.finished_at,
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, EntryData> {
        self.data.read().expect("timeline entry lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, EntryData> {
        self.data.write().expect("timeline entry lock poisoned")
    }
}
