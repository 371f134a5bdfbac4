//! Choosing which files go into the next annotation task.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::models::*;

/// Number of files in a batch: `percentage` of the pool, rounded.
///
/// The percentage is clamped to `1..=100`.
pub fn batch_size(pool_len: usize, percentage: f32) -> usize {
    let percentage = if percentage.is_nan() {
        1.0
    } else {
        f64::from(percentage).clamp(1.0, 100.0)
    };
    (percentage / 100.0 * pool_len as f64).round() as usize
}

/// Local files not present remotely, matched by name; sorted and deduplicated.
pub fn unannotated_pool(local: &[LocalFile], remote: &[RemoteFile]) -> Vec<LocalFile> {
    let remote: HashSet<&str> = remote.iter().map(|f| f.file_name.as_str()).collect();
    let pool: BTreeMap<&str, &LocalFile> = local
        .iter()
        .filter(|f| !remote.contains(f.name.as_str()))
        .map(|f| (f.name.as_str(), f))
        .collect();
    pool.into_values().cloned().collect()
}

/// Picks the next batch from the unannotated pool.
#[derive(Debug, Clone, Copy)]
pub struct BatchSelector {
    pub strategy: PickStrategy,
    pub batch_size: usize,
}

impl BatchSelector {
    pub fn new(strategy: PickStrategy, batch_size: usize) -> Self {
        Self {
            strategy,
            batch_size,
        }
    }

    /// Select at most `batch_size` distinct files from `pool`.
    ///
    /// Active learning needs predictions; without them it degrades to random.
    pub fn select<R: Rng + ?Sized>(
        &self,
        pool: &[LocalFile],
        predictions: Option<&PredictionSet>,
        rng: &mut R,
    ) -> Vec<LocalFile> {
        let pool = dedup_by_name(pool);
        match (self.strategy, predictions) {
            (PickStrategy::ActiveLearning, Some(predictions)) => {
                self.by_confidence(pool, predictions, rng)
            }
            (PickStrategy::ActiveLearning, None) => {
                tracing::warn!("Active learning requested without predictions, picking randomly");
                self.random(pool, rng)
            }
            (PickStrategy::Random, _) => self.random(pool, rng),
        }
    }

    fn random<R: Rng + ?Sized>(&self, mut pool: Vec<LocalFile>, rng: &mut R) -> Vec<LocalFile> {
        pool.shuffle(rng);
        pool.truncate(self.batch_size);
        pool
    }

    /// Most confident files first; unscored files last, in random order.
    fn by_confidence<R: Rng + ?Sized>(
        &self,
        mut pool: Vec<LocalFile>,
        predictions: &PredictionSet,
        rng: &mut R,
    ) -> Vec<LocalFile> {
        let scores: HashMap<&str, Option<f32>> = predictions
            .predictions
            .iter()
            .map(|p| (p.file_name.as_str(), p.best_score()))
            .collect();

        // Shuffle first so the stable sort breaks ties randomly.
        pool.shuffle(rng);
        let mut scored: Vec<(Option<f32>, LocalFile)> = pool
            .into_iter()
            .map(|f| (scores.get(f.name.as_str()).copied().flatten(), f))
            .collect();
        scored.sort_by(|(a, _), (b, _)| compare_scores_desc(*a, *b));

        scored
            .into_iter()
            .take(self.batch_size)
            .map(|(_, f)| f)
            .collect()
    }
}

fn compare_scores_desc(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn dedup_by_name(files: &[LocalFile]) -> Vec<LocalFile> {
    let mut seen = HashSet::new();
    files
        .iter()
        .filter(|f| seen.insert(f.name.as_str()))
        .cloned()
        .collect()
}
