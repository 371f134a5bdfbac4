//! Keeping predictions in sync with the selected model and file set.

use std::collections::HashSet;

use crate::models::*;

/// Whether previously computed predictions can be reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDecision {
    Fresh,
    Stale(StaleReason),
}

/// Why predictions must be recomputed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    NoPredictions,
    ModelChanged,
    /// Requested files the previous run never saw.
    MissingFiles(usize),
}

impl StaleReason {
    pub fn describe(&self) -> String {
        match self {
            Self::NoPredictions => "no predictions yet".to_string(),
            Self::ModelChanged => "model has changed".to_string(),
            Self::MissingFiles(n) => format!("{} file(s) have no predictions", n),
        }
    }
}

/// Decides whether cached inference results are still valid.
pub struct PredictionCacheGuard;

impl PredictionCacheGuard {
    /// Stale iff there are no previous predictions, they came from another
    /// model, or `files` is not a subset of what they cover (by name).
    pub fn check(
        previous: Option<&PredictionSet>,
        model: &TrainedModelReference,
        files: &[LocalFile],
    ) -> CacheDecision {
        let Some(previous) = previous else {
            return CacheDecision::Stale(StaleReason::NoPredictions);
        };
        if &previous.model != model {
            return CacheDecision::Stale(StaleReason::ModelChanged);
        }

        let covered = previous.covered_files();
        let missing = files
            .iter()
            .map(|f| f.name.as_str())
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|name| !covered.contains(name))
            .count();
        if missing > 0 {
            return CacheDecision::Stale(StaleReason::MissingFiles(missing));
        }

        CacheDecision::Fresh
    }
}

/// Files predictions should cover under `strategy`.
///
/// Keeps `percentage` of the candidates, taking the first ones by name so
/// consecutive cycles request the same set and the cache stays valid.
pub fn files_to_predict(
    strategy: PredictionStrategy,
    all_files: &[LocalFile],
    unannotated: &[LocalFile],
    percentage: f32,
) -> Vec<LocalFile> {
    let mut candidates = match strategy {
        PredictionStrategy::Disabled => return Vec::new(),
        PredictionStrategy::AllFiles => all_files.to_vec(),
        PredictionStrategy::Unlabeled => unannotated.to_vec(),
    };
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    candidates.dedup_by(|a, b| a.name == b.name);

    let keep = crate::batch::batch_size(candidates.len(), percentage);
    candidates.truncate(keep);
    candidates
}
