use crate::batch::{self, BatchSelector};
use crate::error::{Error, Result};
use crate::injector::AutoAnnotationInjector;
use crate::models::*;
use crate::timeline::{CancellationToken, EntryKind, TimelineEntry};

use super::Orchestrator;

impl Orchestrator {
    /// Push the next batch of unannotated files to the annotation service.
    ///
    /// Refreshes both file listings, picks `batch_percentage` of the pool with
    /// the configured strategy and creates a remote task from it. With
    /// auto-annotation enabled, uploads the predictions that pass the
    /// threshold policy. The pool is recomputed once the task exists.
    pub async fn create_next_task(&self, cancel: &CancellationToken) -> Result<Option<CreatedTask>> {
        let predictions = self.latest_predictions();
        self.history
            .run(EntryKind::CreateTask, "Creating next task", cancel, |entry| async move {
                let remote = &self.project.remote;
                self.project.assets.refresh().await?;
                remote.refresh().await?;

                let pool = self.unannotated_pool();
                if pool.is_empty() {
                    return Err(Error::inconsistent("No unannotated files left to create a task from"));
                }

                let selector = BatchSelector::new(
                    self.config.pick_strategy,
                    batch::batch_size(pool.len(), self.config.batch_percentage).max(1),
                );
                let files = selector.select(&pool, predictions.as_ref(), &mut rand::rng());
                entry.set_text(format!(
                    "Creating task with {} of {} unannotated file(s) ({})",
                    files.len(),
                    pool.len(),
                    self.config.pick_strategy.as_str()
                ));

                let task_id = remote.create_task(&files).await?;
                entry.append_line(format!("Created task #{}", task_id));

                remote.refresh().await?;
                let remaining = self.unannotated_pool();
                entry.append_line(format!("Unannotated files left: {}", remaining.len()));

                let uploaded_shapes = if self.config.auto_annotate {
                    self.auto_annotate(&entry, task_id, &files, predictions.as_ref())
                        .await?
                } else {
                    0
                };

                Ok(CreatedTask {
                    task_id,
                    files: files.into_iter().map(|f| f.name).collect(),
                    uploaded_shapes,
                })
            })
            .await
    }

    async fn auto_annotate(
        &self,
        entry: &TimelineEntry,
        task_id: TaskId,
        files: &[LocalFile],
        predictions: Option<&PredictionSet>,
    ) -> Result<usize> {
        let Some(predictions) = predictions else {
            tracing::warn!("Auto-annotation enabled but there are no predictions");
            entry.append_line("Warning: no predictions available, nothing was pre-annotated");
            return Ok(0);
        };

        let remote = &self.project.remote;
        let frames = remote.task_frames(task_id).await?;
        let shapes = AutoAnnotationInjector::new(&self.config.threshold).inject(
            predictions,
            files,
            &frames,
            &remote.labels(),
        )?;

        if shapes.is_empty() {
            tracing::warn!("Auto-annotation placed no shapes on task #{}", task_id);
            entry.append_line(format!(
                "Warning: auto-annotation placed no shapes using {}",
                predictions.model
            ));
            return Ok(0);
        }

        remote.upload_annotations(task_id, &shapes).await?;
        entry.append_line(format!("Uploaded {} shape(s)", shapes.len()));
        Ok(shapes.len())
    }
}
