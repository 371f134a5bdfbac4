//! Turning model predictions into pre-filled annotations for a new task.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::*;

/// Per-label confidence cut-off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelThreshold {
    pub threshold: f32,
    pub enabled: bool,
}

impl Default for LabelThreshold {
    /// A label seen for the first time: enabled, nothing filtered.
    fn default() -> Self {
        Self {
            threshold: 0.0,
            enabled: true,
        }
    }
}

/// Which predicted labels are confident enough to upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// One threshold in `0..=1` for every label.
    Global { threshold: f32 },
    /// Independent threshold per model label id. Labels without an entry use
    /// [`LabelThreshold::default`].
    PerLabel {
        labels: BTreeMap<u32, LabelThreshold>,
    },
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::Global { threshold: 0.25 }
    }
}

impl ThresholdPolicy {
    /// Keep iff the label is enabled and its score reaches the threshold.
    /// A missing score counts as zero.
    pub fn keeps(&self, label_id: u32, score: Option<f32>) -> bool {
        let score = score.unwrap_or(0.0);
        match self {
            Self::Global { threshold } => score >= *threshold,
            Self::PerLabel { labels } => {
                let label = labels.get(&label_id).copied().unwrap_or_default();
                label.enabled && score >= label.threshold
            }
        }
    }
}

/// Keep/drop decision for each label, in order.
pub fn filter_labels(policy: &ThresholdPolicy, labels: &[PredictedLabel]) -> Vec<bool> {
    labels
        .iter()
        .map(|l| policy.keeps(l.label_id, l.score))
        .collect()
}

/// Maps kept predictions of a batch onto a freshly created remote task.
pub struct AutoAnnotationInjector<'a> {
    policy: &'a ThresholdPolicy,
}

impl<'a> AutoAnnotationInjector<'a> {
    pub fn new(policy: &'a ThresholdPolicy) -> Self {
        Self { policy }
    }

    /// Build upload records for every kept label on every file in `batch`.
    ///
    /// `frames` is the task's ordered frame list; `project_labels` the
    /// project's label set. Model label ids index into the project labels
    /// ordered by remote id. An unresolved frame or label is an
    /// [`Error::Inconsistent`]: nothing is silently dropped.
    pub fn inject(
        &self,
        predictions: &PredictionSet,
        batch: &[LocalFile],
        frames: &[TaskFrame],
        project_labels: &[ProjectLabel],
    ) -> Result<Vec<RectangleAnnotation>> {
        let frames_by_name: HashMap<String, usize> = frames
            .iter()
            .enumerate()
            .map(|(idx, frame)| (frame.name.to_lowercase(), idx))
            .collect();

        let mut ordered_labels: Vec<&ProjectLabel> = project_labels.iter().collect();
        ordered_labels.sort_by_key(|l| l.id);
        let labels_by_name: HashMap<&str, &ProjectLabel> = project_labels
            .iter()
            .map(|l| (l.name.as_str(), l))
            .collect();

        let mut shapes = Vec::new();
        for file in batch {
            let Some(prediction) = predictions.for_file(&file.name) else {
                continue;
            };

            for label in prediction
                .labels
                .iter()
                .filter(|l| self.policy.keeps(l.label_id, l.score))
            {
                let frame_index = *frames_by_name
                    .get(&file.name.to_lowercase())
                    .ok_or_else(|| {
                        Error::inconsistent(format!(
                            "Failed to resolve frame using name {}",
                            file.name
                        ))
                    })?;

                let label_name = ordered_labels
                    .get(label.label_id as usize)
                    .map(|l| l.name.as_str())
                    .ok_or_else(|| {
                        Error::inconsistent(format!(
                            "Failed to resolve model label using id {}, known labels: {}",
                            label.label_id,
                            ordered_labels.len()
                        ))
                    })?;

                let remote_label = labels_by_name.get(label_name).ok_or_else(|| {
                    Error::inconsistent(format!(
                        "Failed to resolve project label using name {}",
                        label_name
                    ))
                })?;

                shapes.push(RectangleAnnotation {
                    frame_index,
                    label_id: remote_label.id,
                    bbox: label.bbox,
                });
            }
        }

        Ok(shapes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn label(label_id: u32, score: f32) -> PredictedLabel {
        PredictedLabel {
            label_id,
            bbox: BoundingBox::new(0.1, 0.2, 0.3, 0.4),
            score: Some(score),
        }
    }

    fn predictions(files: Vec<(&str, Vec<PredictedLabel>)>) -> PredictionSet {
        PredictionSet {
            model: TrainedModelReference::new("best.pt"),
            output_dir: PathBuf::from("/predict"),
            predictions: files
                .into_iter()
                .map(|(name, labels)| FilePrediction {
                    file_name: name.to_string(),
                    path: PathBuf::from(name),
                    labels,
                })
                .collect(),
        }
    }

    fn project_labels() -> Vec<ProjectLabel> {
        vec![
            ProjectLabel {
                id: 20,
                name: "truck".to_string(),
            },
            ProjectLabel {
                id: 10,
                name: "car".to_string(),
            },
        ]
    }

    fn frames(names: &[&str]) -> Vec<TaskFrame> {
        names
            .iter()
            .map(|n| TaskFrame {
                name: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn global_threshold_keeps_scores_at_or_above() {
        let policy = ThresholdPolicy::Global { threshold: 0.25 };
        let labels = vec![label(0, 0.1), label(0, 0.3), label(0, 0.5)];
        assert_eq!(filter_labels(&policy, &labels), vec![false, true, true]);
    }

    #[test]
    fn per_label_threshold_respects_enabled_flag() {
        let mut labels = BTreeMap::new();
        labels.insert(
            0,
            LabelThreshold {
                threshold: 0.5,
                enabled: true,
            },
        );
        labels.insert(
            1,
            LabelThreshold {
                threshold: 0.0,
                enabled: false,
            },
        );
        let policy = ThresholdPolicy::PerLabel { labels };

        assert!(policy.keeps(0, Some(0.6)));
        assert!(!policy.keeps(0, Some(0.4)));
        assert!(!policy.keeps(1, Some(0.99)));
        // unconfigured labels are treated as newly discovered
        assert!(policy.keeps(7, Some(0.01)));
    }

    #[test]
    fn maps_labels_to_frames_and_remote_ids() {
        let policy = ThresholdPolicy::Global { threshold: 0.25 };
        let set = predictions(vec![
            ("b.png", vec![label(0, 0.9), label(1, 0.1)]),
            ("a.png", vec![label(1, 0.8)]),
        ]);
        let batch = vec![LocalFile::from_path("a.png"), LocalFile::from_path("b.png")];

        let shapes = AutoAnnotationInjector::new(&policy)
            .inject(&set, &batch, &frames(&["A.png", "b.png"]), &project_labels())
            .unwrap();

        assert_eq!(shapes.len(), 2);
        // model label 1 -> second label by remote id -> truck (20)
        assert_eq!(shapes[0].frame_index, 0);
        assert_eq!(shapes[0].label_id, 20);
        // model label 0 -> car (10)
        assert_eq!(shapes[1].frame_index, 1);
        assert_eq!(shapes[1].label_id, 10);
    }

    #[test]
    fn unmapped_frame_is_an_error() {
        let policy = ThresholdPolicy::default();
        let set = predictions(vec![("a.png", vec![label(0, 0.9)])]);
        let batch = vec![LocalFile::from_path("a.png")];

        let result = AutoAnnotationInjector::new(&policy).inject(
            &set,
            &batch,
            &frames(&["other.png"]),
            &project_labels(),
        );
        assert!(matches!(result, Err(Error::Inconsistent(_))));
    }

    #[test]
    fn unmapped_label_is_an_error() {
        let policy = ThresholdPolicy::default();
        let set = predictions(vec![("a.png", vec![label(5, 0.9)])]);
        let batch = vec![LocalFile::from_path("a.png")];

        let result = AutoAnnotationInjector::new(&policy).inject(
            &set,
            &batch,
            &frames(&["a.png"]),
            &project_labels(),
        );
        assert!(matches!(result, Err(Error::Inconsistent(_))));
    }

    #[test]
    fn dropped_labels_need_no_lookup() {
        let policy = ThresholdPolicy::Global { threshold: 0.5 };
        let set = predictions(vec![("a.png", vec![label(5, 0.1)])]);
        let batch = vec![LocalFile::from_path("a.png")];

        let shapes = AutoAnnotationInjector::new(&policy)
            .inject(&set, &batch, &[], &project_labels())
            .unwrap();
        assert!(shapes.is_empty());
    }
}
