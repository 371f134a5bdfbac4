use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque handle to a trained model artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainedModelReference(pub PathBuf);

impl TrainedModelReference {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &PathBuf {
        &self.0
    }
}

impl fmt::Display for TrainedModelReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// A trained model known to the training tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedModel {
    pub reference: TrainedModelReference,
    /// Last modification time of the artifact, used to pick the latest model.
    pub modified_at: DateTime<Utc>,
    /// Training summary chart, if the tool produced one.
    pub results_image: Option<PathBuf>,
}

/// Axis-aligned box in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A single detection on a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedLabel {
    /// Class index as known to the model.
    pub label_id: u32,
    pub bbox: BoundingBox,
    /// Confidence in `0..=1`, absent when the tool did not report one.
    pub score: Option<f32>,
}

/// All detections for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilePrediction {
    pub file_name: String,
    pub path: PathBuf,
    pub labels: Vec<PredictedLabel>,
}

impl FilePrediction {
    /// Highest confidence among this file's labels. NaN counts as unscored.
    pub fn best_score(&self) -> Option<f32> {
        self.labels
            .iter()
            .filter_map(|l| l.score)
            .filter(|s| !s.is_nan())
            .fold(None, |best, s| match best {
                Some(b) if b >= s => Some(b),
                _ => Some(s),
            })
    }
}

/// Output of one prediction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSet {
    pub model: TrainedModelReference,
    pub output_dir: PathBuf,
    pub predictions: Vec<FilePrediction>,
}

impl PredictionSet {
    /// Names of all files this set covers.
    pub fn covered_files(&self) -> HashSet<&str> {
        self.predictions
            .iter()
            .map(|p| p.file_name.as_str())
            .collect()
    }

    pub fn for_file(&self, file_name: &str) -> Option<&FilePrediction> {
        self.predictions.iter().find(|p| p.file_name == file_name)
    }

    pub fn label_count(&self) -> usize {
        self.predictions.iter().map(|p| p.labels.len()).sum()
    }
}

/// Progress reported by the training tool while training.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainProgress {
    pub epoch_current: u32,
    pub epoch_max: u32,
    pub percent: f32,
}

/// Progress reported by the training tool while predicting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictProgress {
    pub image_current: usize,
    pub image_max: usize,
    pub percent: f32,
}
