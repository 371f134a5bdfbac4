use serde::{Deserialize, Serialize};

use super::dataset::ModelTrainingSettings;
use super::remote::TaskId;

/// Something that changed since the last successful training.
///
/// Callers only rely on [`Changeset::is_empty`]; the variants carry the diff
/// for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Changeset {
    TrainingSettings {
        previous: Option<ModelTrainingSettings>,
        current: Option<ModelTrainingSettings>,
    },
    Project { new_annotated_tasks: Vec<TaskId> },
}

impl Changeset {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::TrainingSettings { previous, current } => previous == current,
            Self::Project {
                new_annotated_tasks,
            } => new_annotated_tasks.is_empty(),
        }
    }
}

/// Outcome of change detection for one cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangesetReport {
    /// Non-empty changesets only.
    pub changesets: Vec<Changeset>,
    /// Whether there was a previous snapshot to compare against.
    pub has_baseline: bool,
    /// Remote files belonging to annotated tasks.
    pub annotated_files: Vec<String>,
}

impl ChangesetReport {
    pub fn is_empty(&self) -> bool {
        self.changesets.iter().all(Changeset::is_empty)
    }

    /// Rebuild and retrain iff there is no baseline yet or something changed.
    pub fn proceed(&self) -> bool {
        !self.has_baseline || !self.is_empty()
    }

    pub fn new_annotated_tasks(&self) -> Vec<TaskId> {
        self.changesets
            .iter()
            .find_map(|c| match c {
                Changeset::Project {
                    new_annotated_tasks,
                } => Some(new_annotated_tasks.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}
