use serde::{Deserialize, Serialize};

use super::prediction::BoundingBox;

/// Identifier of a task in the remote annotation service.
pub type TaskId = u32;

/// A task in the remote annotation project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteTask {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,
}

impl RemoteTask {
    /// A task counts as annotated once reviewers have completed it.
    pub fn is_annotated(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Review status of a remote task.
///
/// - `New`: Created, nobody has started annotating
/// - `InProgress`: Being annotated or reviewed
/// - `Completed`: Ground truth is final and can be trained on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    New,
    InProgress,
    Completed,
}

/// A file already uploaded to the remote project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteFile {
    pub file_name: String,
    /// Task the file belongs to, if the service reports one.
    pub task_id: Option<TaskId>,
}

/// A label class defined on the remote project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectLabel {
    pub id: u32,
    pub name: String,
}

/// One frame of a remote task; frames are ordered and the position is the frame index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFrame {
    pub name: String,
}

/// A rectangle shape to upload onto a task frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectangleAnnotation {
    pub frame_index: usize,
    /// Remote label identifier.
    pub label_id: u32,
    pub bbox: BoundingBox,
}

/// Result of creating the next annotation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedTask {
    pub task_id: TaskId,
    pub files: Vec<String>,
    /// Shapes uploaded by auto-annotation, zero when it was disabled.
    pub uploaded_shapes: usize,
}
