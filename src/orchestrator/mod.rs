//! The unattended train / annotate loop.
//!
//! An [`Orchestrator`] owns the timeline, the selected model and the latest
//! predictions, and drives the collaborators in [`Project`] through one
//! cycle after another until stopped. Observers read state through the
//! accessor methods; only the loop and [`Orchestrator::select_model`] write.

mod cycle;
mod next_task;
mod stages;

pub use cycle::{CycleOutcome, LoopState};

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::accessors::{
    Clock, LocalAssetAccessor, RemoteProjectAccessor, SystemClock, TrainingToolAccessor,
};
use crate::config::OrchestratorConfig;
use crate::error::{Error, Result};
use crate::models::*;
use crate::timeline::{CancellationToken, TimelineEntrySnapshot, TimelineHistory};

/// The collaborators one orchestrator works against.
#[derive(Clone)]
pub struct Project {
    pub remote: Arc<dyn RemoteProjectAccessor>,
    pub assets: Arc<dyn LocalAssetAccessor>,
    pub tool: Arc<dyn TrainingToolAccessor>,
}

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Summary for observers.
#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorStatus {
    pub running: bool,
    pub selected_model: Option<TrainedModelReference>,
    /// Unannotated files as of the last pool refresh.
    pub batch_pool_size: usize,
    /// Files covered by the latest predictions, if any.
    pub predicted_files: Option<usize>,
    pub timeline_entries: usize,
}

pub struct Orchestrator {
    project: Project,
    config: OrchestratorConfig,
    history: Arc<TimelineHistory>,
    selected_model: RwLock<Option<TrainedModelReference>>,
    predictions: RwLock<Option<PredictionSet>>,
    batch_pool: RwLock<Vec<LocalFile>>,
    // Held across the join in `stop`, so a restart waits for the old loop.
    running: Mutex<Option<RunningLoop>>,
}

impl Orchestrator {
    pub fn new(project: Project, config: OrchestratorConfig) -> Self {
        Self::with_clock(project, config, Arc::new(SystemClock))
    }

    pub fn with_clock(project: Project, config: OrchestratorConfig, clock: Arc<dyn Clock>) -> Self {
        let history = Arc::new(TimelineHistory::new(config.history_capacity, clock));
        Self {
            project,
            config,
            history,
            selected_model: RwLock::new(None),
            predictions: RwLock::new(None),
            batch_pool: RwLock::new(Vec::new()),
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn history(&self) -> Arc<TimelineHistory> {
        Arc::clone(&self.history)
    }

    // ============================================================
    // Loop control
    // ============================================================

    /// Spawn the loop on the current runtime.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            return Err(Error::AlreadyRunning);
        }

        let cancel = CancellationToken::new();
        let this = Arc::clone(self);
        let token = cancel.clone();
        let handle = tokio::spawn(async move { this.run_loop(token).await });

        *running = Some(RunningLoop { cancel, handle });
        Ok(())
    }

    /// Cancel the loop and wait until it has unwound.
    pub async fn stop(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        let Some(active) = running.take() else {
            return Err(Error::NotRunning);
        };
        if active.handle.is_finished() {
            return Err(Error::NotRunning);
        }

        active.cancel.cancel();
        if let Err(e) = active.handle.await {
            tracing::error!("Training loop ended abnormally: {}", e);
        }
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let running = self.is_running().await;
        OrchestratorStatus {
            running,
            selected_model: self.selected_model(),
            batch_pool_size: self.batch_pool.read().expect("batch pool lock poisoned").len(),
            predicted_files: self
                .predictions
                .read()
                .expect("predictions lock poisoned")
                .as_ref()
                .map(|p| p.predictions.len()),
            timeline_entries: self.history.len(),
        }
    }

    // ============================================================
    // Observed state
    // ============================================================

    /// Override the model used for predictions.
    ///
    /// Under [`ModelStrategy::Latest`] the next successful training replaces it.
    pub fn select_model(&self, model: Option<TrainedModelReference>) {
        match &model {
            Some(m) => tracing::info!("Model selected: {}", m),
            None => tracing::info!("Model selection cleared"),
        }
        *self.selected_model.write().expect("model lock poisoned") = model;
    }

    pub fn selected_model(&self) -> Option<TrainedModelReference> {
        self.selected_model.read().expect("model lock poisoned").clone()
    }

    pub fn latest_predictions(&self) -> Option<PredictionSet> {
        self.predictions
            .read()
            .expect("predictions lock poisoned")
            .clone()
    }

    /// Unannotated files as of the last pool refresh.
    pub fn batch_pool(&self) -> Vec<LocalFile> {
        self.batch_pool.read().expect("batch pool lock poisoned").clone()
    }

    pub fn timeline(&self) -> Vec<TimelineEntrySnapshot> {
        self.history.snapshot()
    }

    pub fn clear_timeline(&self) {
        self.history.clear();
    }
}
