use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::changeset::{self, ChangesetInput};
use crate::error::{Error, Result};
use crate::models::*;
use crate::prediction::{self, CacheDecision, PredictionCacheGuard};
use crate::timeline::{CancellationToken, EntryKind};

use super::cycle::LoopState;
use super::Orchestrator;

/// Annotated tasks and what was fetched for them during one cycle.
#[derive(Debug, Default)]
pub(super) struct AnnotatedTasks {
    pub tasks: Vec<TaskId>,
    pub files: Vec<RemoteFile>,
    pub annotations: Vec<AnnotationFile>,
}

impl Orchestrator {
    // ============================================================
    // Refresh
    // ============================================================

    pub(super) async fn refresh_local_assets(&self, cancel: &CancellationToken) -> Result<Option<()>> {
        let assets = &self.project.assets;
        self.history
            .run(EntryKind::Refresh, "Refreshing local files", cancel, |entry| async move {
                assets.refresh().await?;
                entry.append_line(format!("Input files: {}", assets.files().len()));
                Ok(())
            })
            .await
    }

    pub(super) async fn refresh_remote_project(&self, cancel: &CancellationToken) -> Result<Option<()>> {
        let remote = &self.project.remote;
        self.history
            .run(EntryKind::Refresh, "Refreshing remote project", cancel, |entry| async move {
                remote.refresh().await?;
                entry.append_line(format!(
                    "Tasks: {}, files: {}, labels: {}",
                    remote.tasks().len(),
                    remote.project_files().len(),
                    remote.labels().len()
                ));
                Ok(())
            })
            .await
    }

    pub(super) async fn refresh_batch_pool(&self, cancel: &CancellationToken) -> Result<Option<()>> {
        self.history
            .run(EntryKind::Refresh, "Refreshing batch pool", cancel, |entry| async move {
                let pool = self.unannotated_pool();
                entry.append_line(format!("Unannotated files: {}", pool.len()));
                Ok(())
            })
            .await
    }

    /// Recompute the unannotated pool from the accessors' current view.
    pub(super) fn unannotated_pool(&self) -> Vec<LocalFile> {
        let pool = self
            .project
            .assets
            .unannotated_files(&self.project.remote.project_files());
        *self.batch_pool.write().expect("batch pool lock poisoned") = pool.clone();
        pool
    }

    /// Fetch files and annotation exports of every annotated task, at most
    /// `max_parallelism` tasks at a time.
    pub(super) async fn refresh_annotations(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<AnnotatedTasks>> {
        let remote = &self.project.remote;
        let mut tasks: Vec<TaskId> = remote
            .tasks()
            .iter()
            .filter(|t| t.is_annotated())
            .map(|t| t.id)
            .collect();
        tasks.sort_unstable();
        tasks.dedup();

        let parallelism = self.config.max_parallelism.max(1);
        let text = format!("Refreshing annotations of {} task(s)", tasks.len());
        self.history
            .run(EntryKind::Refresh, text, cancel, |entry| async move {
                let total = tasks.len();
                let done = AtomicUsize::new(0);
                let (done, entry_ref) = (&done, &entry);

                let mut fetched: Vec<(TaskId, Vec<RemoteFile>, AnnotationFile)> =
                    stream::iter(tasks.iter().copied())
                        .map(|task_id| async move {
                            let mut files = remote.task_files(task_id).await?;
                            for file in &mut files {
                                file.task_id.get_or_insert(task_id);
                            }
                            let annotations = remote.download_annotations(task_id).await?;

                            let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                            entry_ref.set_progress(finished as f32 * 100.0 / total as f32);
                            Ok::<_, Error>((task_id, files, annotations))
                        })
                        .buffer_unordered(parallelism)
                        .try_collect()
                        .await?;
                fetched.sort_by_key(|(task_id, _, _)| *task_id);

                let mut result = AnnotatedTasks {
                    tasks,
                    ..Default::default()
                };
                for (_, files, annotations) in fetched {
                    result.files.extend(files);
                    result.annotations.push(annotations);
                }
                entry.append_line(format!(
                    "Annotated tasks: {}, annotated files: {}",
                    result.tasks.len(),
                    result.files.len()
                ));
                Ok(result)
            })
            .await
    }

    // ============================================================
    // Model & predictions
    // ============================================================

    pub(super) async fn ensure_model_selected(&self, cancel: &CancellationToken) -> Result<Option<()>> {
        let tool = &self.project.tool;
        let strategy = self.config.model_strategy;
        self.history
            .run(EntryKind::ModelSelection, "Selecting model", cancel, |entry| async move {
                if strategy == ModelStrategy::Manual {
                    match self.selected_model() {
                        Some(model) => entry.set_text(format!("Manually selected model: {}", model)),
                        None => entry.set_text("No model selected"),
                    }
                    return Ok(());
                }

                if let Some(model) = self.selected_model() {
                    entry.set_text(format!("Current model: {}", model));
                    return Ok(());
                }

                if tool.trained_models().is_empty() {
                    tool.refresh().await?;
                }
                let latest = tool
                    .trained_models()
                    .into_iter()
                    .max_by_key(|m| m.modified_at);
                match latest {
                    Some(model) => {
                        entry.set_text(format!("Latest model: {}", model.reference));
                        if let Some(image) = &model.results_image {
                            entry.add_image(image.clone());
                        }
                        self.select_model(Some(model.reference));
                    }
                    None => entry.set_text("Could not find any models"),
                }
                Ok(())
            })
            .await
    }

    pub(super) async fn refresh_trained_models(&self, cancel: &CancellationToken) -> Result<Option<()>> {
        let tool = &self.project.tool;
        self.history
            .run(EntryKind::Refresh, "Refreshing trained models", cancel, |entry| async move {
                tool.refresh().await?;
                entry.append_line(format!("Trained models: {}", tool.trained_models().len()));
                Ok(())
            })
            .await
    }

    /// Re-run predictions when the cached ones no longer match the selected
    /// model or the files that need them.
    pub(super) async fn predict_if_stale(&self, cancel: &CancellationToken) -> Result<Option<()>> {
        if cancel.is_cancelled() {
            return Ok(None);
        }
        let Some(model) = self.selected_model() else {
            tracing::debug!("No model selected, skipping predictions");
            return Ok(Some(()));
        };

        let pool = self.batch_pool();
        let files = prediction::files_to_predict(
            self.config.prediction_strategy,
            &self.project.assets.files(),
            &pool,
            self.config.predict_batch_percentage,
        );
        if files.is_empty() {
            tracing::debug!(
                "Nothing to predict under {} strategy",
                self.config.prediction_strategy.as_str()
            );
            return Ok(Some(()));
        }

        let decision = {
            let previous = self.predictions.read().expect("predictions lock poisoned");
            PredictionCacheGuard::check(previous.as_ref(), &model, &files)
        };
        let reason = match decision {
            CacheDecision::Fresh => {
                tracing::debug!("Predictions for {} are up to date", model);
                return Ok(Some(()));
            }
            CacheDecision::Stale(reason) => reason,
        };

        let tool = &self.project.tool;
        let text = format!(
            "Predicting {} file(s) using {} ({})",
            files.len(),
            model,
            reason.describe()
        );
        self.history
            .run(EntryKind::Predict, text, cancel, |entry| async move {
                let progress = |p: PredictProgress| entry.set_progress(p.percent);
                let predictions = tool.predict(&model, &files, &progress).await?;
                entry.append_line(format!(
                    "Predicted {} label(s) in {} file(s)",
                    predictions.label_count(),
                    predictions.predictions.len()
                ));
                *self.predictions.write().expect("predictions lock poisoned") = Some(predictions);
                Ok(())
            })
            .await
    }

    // ============================================================
    // Dataset & training
    // ============================================================

    pub(super) async fn detect_changeset(
        &self,
        state: &LoopState,
        settings: &ModelTrainingSettings,
        annotated: &AnnotatedTasks,
        cancel: &CancellationToken,
    ) -> Result<Option<ChangesetReport>> {
        let report = changeset::detect(&ChangesetInput {
            previous: state.last_trained.as_ref(),
            last_settings: state.last_settings.as_ref(),
            current_settings: settings,
            annotated_tasks: &annotated.tasks,
            remote_files: &annotated.files,
        });
        let text = changeset::describe(&report);
        tracing::debug!("Changeset: {}", text);

        self.history
            .run(EntryKind::Changeset, text, cancel, |_| async move { Ok(report) })
            .await
    }

    pub(super) async fn build_dataset(
        &self,
        state: &LoopState,
        settings: &ModelTrainingSettings,
        report: &ChangesetReport,
        annotated: AnnotatedTasks,
        cancel: &CancellationToken,
    ) -> Result<Option<DatasetSnapshot>> {
        let revision = state
            .last_trained
            .as_ref()
            .map_or(0, |s| s.project.revision)
            + 1;
        let request = DatasetRequest {
            annotations: annotated.annotations,
            project: ProjectInfo {
                revision,
                project_name: None,
                tasks: annotated.tasks,
                files: report.annotated_files.clone(),
                settings: settings.clone(),
            },
        };

        let tool = &self.project.tool;
        let text = format!("Creating dataset revision {}", revision);
        self.history
            .run(EntryKind::CreateDataset, text, cancel, |entry| async move {
                let dataset = tool.build_dataset(request).await?;
                entry.append_line(format!(
                    "Files: {}, train: {}, validation: {}, test: {}",
                    dataset.splits.total(),
                    dataset.splits.train,
                    dataset.splits.validation,
                    dataset.splits.test
                ));
                Ok(dataset)
            })
            .await
    }

    pub(super) async fn train(
        &self,
        dataset: &DatasetSnapshot,
        settings: &ModelTrainingSettings,
        cancel: &CancellationToken,
    ) -> Result<Option<TrainedModel>> {
        let tool = &self.project.tool;
        let Some(()) = self
            .history
            .run(EntryKind::PreTraining, "Running pre-training checks", cancel, |_| async move {
                tool.run_checks().await
            })
            .await?
        else {
            return Ok(None);
        };

        let text = format!(
            "Training revision {} ({})",
            dataset.project.revision, settings
        );
        self.history
            .run(EntryKind::Training, text, cancel, |entry| async move {
                let progress = |p: TrainProgress| entry.set_progress(p.percent);
                let model = tool.train(dataset, settings, &progress).await?;
                entry.append_line(format!("Trained model: {}", model.reference));
                if let Some(image) = &model.results_image {
                    entry.add_image(image.clone());
                }
                Ok(model)
            })
            .await
    }

    pub(super) async fn export_for_cloud(
        &self,
        dataset: &DatasetSnapshot,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>> {
        let tool = &self.project.tool;
        let text = format!("Exporting dataset revision {}", dataset.project.revision);
        self.history
            .run(EntryKind::CloudExport, text, cancel, |entry| async move {
                let archive = tool.export_for_cloud(dataset).await?;
                entry.append_line(format!("Archive: {}", archive.display()));
                Ok(archive)
            })
            .await
    }

    /// Promote a freshly trained model under [`ModelStrategy::Latest`].
    pub(super) fn adopt_model(&self, model: TrainedModel) {
        if self.config.model_strategy != ModelStrategy::Latest {
            tracing::debug!("Keeping manually selected model");
            return;
        }
        self.history
            .push_message(format!("Selected new model: {}", model.reference));
        self.select_model(Some(model.reference));
    }

    pub(super) async fn update_tool(&self, cancel: &CancellationToken) -> Result<Option<()>> {
        let tool = &self.project.tool;
        self.history
            .run(
                EntryKind::UpdateTool,
                "Training tool is outdated, updating",
                cancel,
                |_| async move { tool.update().await },
            )
            .await
    }
}
