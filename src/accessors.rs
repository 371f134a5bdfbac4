//! Contracts for the collaborators the orchestrator drives.
//!
//! Implementations live outside this crate: the annotation service client,
//! the local image scanner and the training tool wrapper. The orchestrator
//! treats everything behind these traits as opaque.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::*;

/// Remote annotation project.
#[async_trait]
pub trait RemoteProjectAccessor: Send + Sync {
    /// Re-read tasks, files and labels from the service.
    async fn refresh(&self) -> Result<()>;

    /// Tasks as of the last refresh, with their review status.
    fn tasks(&self) -> Vec<RemoteTask>;

    /// Files uploaded to the project as of the last refresh.
    fn project_files(&self) -> Vec<RemoteFile>;

    /// Label classes defined on the project.
    fn labels(&self) -> Vec<ProjectLabel>;

    /// Files belonging to one task.
    async fn task_files(&self, task_id: TaskId) -> Result<Vec<RemoteFile>>;

    /// Ordered frames of a task; the position is the frame index.
    async fn task_frames(&self, task_id: TaskId) -> Result<Vec<TaskFrame>>;

    /// Export the task's annotations, reusing a cached export when present.
    async fn download_annotations(&self, task_id: TaskId) -> Result<AnnotationFile>;

    /// Create a task containing `files` and return its id.
    async fn create_task(&self, files: &[LocalFile]) -> Result<TaskId>;

    /// Upload rectangle shapes onto a task's frames.
    async fn upload_annotations(
        &self,
        task_id: TaskId,
        shapes: &[RectangleAnnotation],
    ) -> Result<()>;
}

/// Local image storage.
#[async_trait]
pub trait LocalAssetAccessor: Send + Sync {
    async fn refresh(&self) -> Result<()>;

    /// Every local image as of the last refresh.
    fn files(&self) -> Vec<LocalFile>;

    /// Local images not yet represented remotely, matched by file name.
    fn unannotated_files(&self, remote: &[RemoteFile]) -> Vec<LocalFile> {
        crate::batch::unannotated_pool(&self.files(), remote)
    }
}

/// Training / inference tool.
#[async_trait]
pub trait TrainingToolAccessor: Send + Sync {
    /// Re-scan trained models and datasets on disk.
    async fn refresh(&self) -> Result<()>;

    /// Trained models as of the last refresh.
    fn trained_models(&self) -> Vec<TrainedModel>;

    /// Settings the next training would use.
    fn training_settings(&self) -> ModelTrainingSettings;

    async fn build_dataset(&self, request: DatasetRequest) -> Result<DatasetSnapshot>;

    /// Environment checks run before every local training.
    async fn run_checks(&self) -> Result<()>;

    /// Train on `dataset`. Fails with [`Error::ToolOutdated`] when the tool
    /// must be updated first.
    ///
    /// [`Error::ToolOutdated`]: crate::Error::ToolOutdated
    async fn train(
        &self,
        dataset: &DatasetSnapshot,
        settings: &ModelTrainingSettings,
        progress: &(dyn Fn(TrainProgress) + Send + Sync),
    ) -> Result<TrainedModel>;

    async fn predict(
        &self,
        model: &TrainedModelReference,
        files: &[LocalFile],
        progress: &(dyn Fn(PredictProgress) + Send + Sync),
    ) -> Result<PredictionSet>;

    /// Package the dataset for training elsewhere; returns the archive path.
    async fn export_for_cloud(&self, dataset: &DatasetSnapshot) -> Result<PathBuf>;

    /// Install the latest tool release.
    async fn update(&self) -> Result<()>;
}

/// Source of timestamps for timeline entries.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

