use std::sync::Arc;

use crate::error::Error;
use crate::models::*;
use crate::timeline::CancellationToken;

use super::Orchestrator;

/// Bookkeeping threaded from one cycle into the next.
#[derive(Debug, Clone, Default)]
pub struct LoopState {
    /// Number of the last started cycle, 1-based.
    pub cycle: u64,
    /// Snapshot of the last successful training or export.
    pub last_trained: Option<DatasetSnapshot>,
    pub last_settings: Option<ModelTrainingSettings>,
}

/// Failure of a cycle stage; errors from training are kept apart so only
/// they can trigger a tool update.
#[derive(Debug)]
enum StageError {
    Training(Error),
    Other(Error),
}

impl From<Error> for StageError {
    fn from(error: Error) -> Self {
        Self::Other(error)
    }
}

/// How a single cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A model was trained on the given dataset revision.
    Trained { revision: u32 },
    /// The dataset was exported for cloud training.
    Exported { revision: u32 },
    /// Nothing changed since the last training.
    Skipped,
    /// The cycle failed; the error was recorded on the timeline.
    Failed(String),
    Cancelled,
}

impl Orchestrator {
    pub(super) async fn run_loop(self: Arc<Self>, cancel: CancellationToken) {
        self.history.push_message("Automatic training started");

        let mut state = LoopState::default();
        while !cancel.is_cancelled() {
            if self.run_cycle(&mut state, &cancel).await == CycleOutcome::Cancelled {
                break;
            }
            if !self.history.wait(self.config.cycle_timeout(), &cancel).await {
                break;
            }
        }

        self.history.push_message("Automatic training stopped");
    }

    /// Run one full cycle against `state`.
    ///
    /// A training tool that reports itself outdated while training is updated
    /// once and the cycle restarts from the top with the same number. Any other
    /// failure is recorded as a single error entry.
    pub async fn run_cycle(
        &self,
        state: &mut LoopState,
        cancel: &CancellationToken,
    ) -> CycleOutcome {
        state.cycle += 1;
        let cycle = state.cycle;
        self.history.push_message(format!("Cycle #{} started", cycle));

        let mut tool_updated = false;
        let outcome = loop {
            let error = match self.run_stages(state, cancel).await {
                Ok(Some(outcome)) => break outcome,
                Ok(None) => return self.cancelled(cycle),
                Err(StageError::Training(e)) if e.is_tool_outdated() && !tool_updated => e,
                Err(StageError::Training(e) | StageError::Other(e)) => break self.failed(cycle, e),
            };

            tool_updated = true;
            tracing::warn!("Cycle #{}: {}", cycle, error);
            match self.update_tool(cancel).await {
                Ok(Some(())) => {
                    self.history
                        .push_message(format!("Training tool updated, restarting cycle #{}", cycle));
                }
                Ok(None) => return self.cancelled(cycle),
                Err(e) => break self.failed(cycle, e),
            }
        };

        self.history.push_message(format!("Cycle #{} completed", cycle));
        outcome
    }

    fn failed(&self, cycle: u64, error: Error) -> CycleOutcome {
        tracing::error!("Cycle #{} failed: {}", cycle, error);
        self.history.push_error(&error);
        CycleOutcome::Failed(error.to_string())
    }

    fn cancelled(&self, cycle: u64) -> CycleOutcome {
        tracing::info!("Cycle #{} cancelled", cycle);
        CycleOutcome::Cancelled
    }

    /// Every stage of a cycle in order. `Ok(None)` means a stop was requested.
    async fn run_stages(
        &self,
        state: &mut LoopState,
        cancel: &CancellationToken,
    ) -> std::result::Result<Option<CycleOutcome>, StageError> {
        let Some(()) = self.refresh_local_assets(cancel).await? else {
            return Ok(None);
        };
        let Some(()) = self.refresh_remote_project(cancel).await? else {
            return Ok(None);
        };
        let Some(()) = self.refresh_batch_pool(cancel).await? else {
            return Ok(None);
        };
        let Some(annotations) = self.refresh_annotations(cancel).await? else {
            return Ok(None);
        };
        let Some(()) = self.ensure_model_selected(cancel).await? else {
            return Ok(None);
        };
        let Some(()) = self.refresh_trained_models(cancel).await? else {
            return Ok(None);
        };
        let Some(()) = self.predict_if_stale(cancel).await? else {
            return Ok(None);
        };

        let settings = self.project.tool.training_settings();
        let Some(report) = self
            .detect_changeset(state, &settings, &annotations, cancel)
            .await?
        else {
            return Ok(None);
        };
        if !report.proceed() {
            self.history.push_message("No changes, skipping training");
            return Ok(Some(CycleOutcome::Skipped));
        }

        let Some(dataset) = self
            .build_dataset(state, &settings, &report, annotations, cancel)
            .await?
        else {
            return Ok(None);
        };
        let revision = dataset.project.revision;

        let outcome = match self.config.training_mode {
            TrainingMode::Local => {
                let Some(model) = self
                    .train(&dataset, &settings, cancel)
                    .await
                    .map_err(StageError::Training)?
                else {
                    return Ok(None);
                };
                self.adopt_model(model);
                CycleOutcome::Trained { revision }
            }
            TrainingMode::Cloud => {
                let Some(_archive) = self.export_for_cloud(&dataset, cancel).await? else {
                    return Ok(None);
                };
                CycleOutcome::Exported { revision }
            }
        };

        state.last_trained = Some(dataset);
        state.last_settings = Some(settings);
        Ok(Some(outcome))
    }
}
