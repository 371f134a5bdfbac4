use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::remote::TaskId;

/// Settings a model was (or will be) trained with.
///
/// Two settings values describe the same training run iff they are
/// structurally equal; any difference justifies retraining.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelTrainingSettings {
    /// Base model the training starts from (e.g. `yolov8n.pt`).
    pub model: String,
    /// Square input size in pixels.
    pub model_size: u32,
    pub epochs: u32,
}

impl fmt::Display for ModelTrainingSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model: {}, size: {}, epochs: {}",
            self.model, self.model_size, self.epochs
        )
    }
}

/// Description of the remote project state a dataset was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Monotonic dataset revision, starting at 1.
    pub revision: u32,
    pub project_name: Option<String>,
    /// Annotated tasks included in the dataset.
    pub tasks: Vec<TaskId>,
    /// File names included in the dataset.
    pub files: Vec<String>,
    pub settings: ModelTrainingSettings,
}

/// Image counts per dataset split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitCounts {
    pub train: usize,
    pub validation: usize,
    pub test: usize,
}

impl SplitCounts {
    pub fn total(&self) -> usize {
        self.train + self.validation + self.test
    }
}

/// A training dataset assembled from downloaded annotations.
///
/// Snapshots are immutable: the next training cycle produces a new one rather
/// than editing this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSnapshot {
    /// Index artifact describing the dataset layout.
    pub index_file: PathBuf,
    pub splits: SplitCounts,
    pub project: ProjectInfo,
}

/// An annotation export for one remote task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationFile {
    pub task_id: TaskId,
    pub path: PathBuf,
}

/// Input for building a dataset snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetRequest {
    pub annotations: Vec<AnnotationFile>,
    /// Project description to embed into the resulting snapshot.
    pub project: ProjectInfo,
}
