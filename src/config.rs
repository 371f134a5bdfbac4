//! Orchestrator configuration loaded from defaults, serde or environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::injector::ThresholdPolicy;
use crate::models::{ModelStrategy, PickStrategy, PredictionStrategy, TrainingMode};
use crate::timeline::DEFAULT_CAPACITY;

/// Everything the loop can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Pause between cycles, in seconds (from AUTOTRAINER_CYCLE_TIMEOUT_SECS)
    pub cycle_timeout_secs: u64,
    /// Timeline entries kept before eviction (from AUTOTRAINER_HISTORY_CAPACITY)
    pub history_capacity: usize,
    /// Share of the unannotated pool put into a new task, 1-100
    pub batch_percentage: f32,
    /// Share of the prediction candidates actually predicted, 1-100
    pub predict_batch_percentage: f32,
    pub pick_strategy: PickStrategy,
    pub prediction_strategy: PredictionStrategy,
    pub model_strategy: ModelStrategy,
    pub training_mode: TrainingMode,
    /// Upload predictions as pre-filled shapes on new tasks
    pub auto_annotate: bool,
    pub threshold: ThresholdPolicy,
    /// Concurrent per-task requests while refreshing annotations
    pub max_parallelism: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            cycle_timeout_secs: 30,
            history_capacity: DEFAULT_CAPACITY,
            batch_percentage: 5.0,
            predict_batch_percentage: 100.0,
            pick_strategy: PickStrategy::default(),
            prediction_strategy: PredictionStrategy::default(),
            model_strategy: ModelStrategy::default(),
            training_mode: TrainingMode::default(),
            auto_annotate: false,
            threshold: ThresholdPolicy::default(),
            max_parallelism: 4,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from `AUTOTRAINER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let parsed = |key: &str| -> Option<String> { read(key).filter(|v| !v.is_empty()) };

        let threshold = match parsed("AUTOTRAINER_CONFIDENCE_THRESHOLD")
            .and_then(|v| parse_or_warn::<f32>("AUTOTRAINER_CONFIDENCE_THRESHOLD", &v))
        {
            Some(threshold) => ThresholdPolicy::Global {
                threshold: threshold.clamp(0.0, 1.0),
            },
            None => defaults.threshold.clone(),
        };

        Self {
            cycle_timeout_secs: parsed("AUTOTRAINER_CYCLE_TIMEOUT_SECS")
                .and_then(|v| parse_or_warn("AUTOTRAINER_CYCLE_TIMEOUT_SECS", &v))
                .unwrap_or(defaults.cycle_timeout_secs),
            history_capacity: parsed("AUTOTRAINER_HISTORY_CAPACITY")
                .and_then(|v| parse_or_warn("AUTOTRAINER_HISTORY_CAPACITY", &v))
                .unwrap_or(defaults.history_capacity),
            batch_percentage: parsed("AUTOTRAINER_BATCH_PERCENTAGE")
                .and_then(|v| parse_or_warn("AUTOTRAINER_BATCH_PERCENTAGE", &v))
                .unwrap_or(defaults.batch_percentage),
            predict_batch_percentage: parsed("AUTOTRAINER_PREDICT_BATCH_PERCENTAGE")
                .and_then(|v| parse_or_warn("AUTOTRAINER_PREDICT_BATCH_PERCENTAGE", &v))
                .unwrap_or(defaults.predict_batch_percentage),
            pick_strategy: parsed("AUTOTRAINER_PICK_STRATEGY")
                .and_then(|v| PickStrategy::from_str(&v))
                .unwrap_or(defaults.pick_strategy),
            prediction_strategy: parsed("AUTOTRAINER_PREDICTION_STRATEGY")
                .and_then(|v| PredictionStrategy::from_str(&v))
                .unwrap_or(defaults.prediction_strategy),
            model_strategy: parsed("AUTOTRAINER_MODEL_STRATEGY")
                .and_then(|v| ModelStrategy::from_str(&v))
                .unwrap_or(defaults.model_strategy),
            training_mode: parsed("AUTOTRAINER_TRAINING_MODE")
                .and_then(|v| TrainingMode::from_str(&v))
                .unwrap_or(defaults.training_mode),
            auto_annotate: parsed("AUTOTRAINER_AUTO_ANNOTATE")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.auto_annotate),
            threshold,
            max_parallelism: parsed("AUTOTRAINER_MAX_PARALLELISM")
                .and_then(|v| parse_or_warn::<usize>("AUTOTRAINER_MAX_PARALLELISM", &v))
                .map(|n| n.max(1))
                .unwrap_or(defaults.max_parallelism),
        }
    }

    pub fn cycle_timeout(&self) -> Duration {
        Duration::from_secs(self.cycle_timeout_secs)
    }
}

fn parse_or_warn<T: std::str::FromStr>(key: &str, value: &str) -> Option<T> {
    let parsed = value.parse::<T>().ok();
    if parsed.is_none() {
        tracing::warn!("Ignoring invalid value {:?} for {}", value, key);
    }
    parsed
}
