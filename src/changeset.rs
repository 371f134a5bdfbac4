//! Decides whether a cycle has anything new to train on.

use std::collections::{BTreeSet, HashSet};

use crate::models::*;

/// Everything change detection looks at for one cycle.
#[derive(Debug, Clone, Copy)]
pub struct ChangesetInput<'a> {
    /// Snapshot of the last successful training, `None` before the first one.
    pub previous: Option<&'a DatasetSnapshot>,
    /// Settings of the last successful training; falls back to the snapshot's.
    pub last_settings: Option<&'a ModelTrainingSettings>,
    pub current_settings: &'a ModelTrainingSettings,
    /// Tasks whose annotation is complete right now.
    pub annotated_tasks: &'a [TaskId],
    /// Remote files, mapped to their tasks.
    pub remote_files: &'a [RemoteFile],
}

/// Compare the live project against the last trained snapshot.
///
/// Without a previous snapshot the report has no baseline and
/// [`ChangesetReport::proceed`] is true: the first cycle always trains.
pub fn detect(input: &ChangesetInput<'_>) -> ChangesetReport {
    let annotated: HashSet<TaskId> = input.annotated_tasks.iter().copied().collect();
    let annotated_files = files_of_tasks(input.remote_files, &annotated);

    let Some(previous) = input.previous else {
        return ChangesetReport {
            changesets: Vec::new(),
            has_baseline: false,
            annotated_files,
        };
    };

    let last_settings = input.last_settings.unwrap_or(&previous.project.settings);
    let settings = settings_changeset(last_settings, input.current_settings);
    let project = project_changeset(&previous.project.tasks, input.annotated_tasks);

    ChangesetReport {
        changesets: [settings, project]
            .into_iter()
            .filter(|c| !c.is_empty())
            .collect(),
        has_baseline: true,
        annotated_files,
    }
}

fn settings_changeset(
    previous: &ModelTrainingSettings,
    current: &ModelTrainingSettings,
) -> Changeset {
    if previous == current {
        return Changeset::TrainingSettings {
            previous: None,
            current: None,
        };
    }
    Changeset::TrainingSettings {
        previous: Some(previous.clone()),
        current: Some(current.clone()),
    }
}

fn project_changeset(trained: &[TaskId], annotated: &[TaskId]) -> Changeset {
    let trained: HashSet<TaskId> = trained.iter().copied().collect();
    let new_annotated_tasks: BTreeSet<TaskId> = annotated
        .iter()
        .copied()
        .filter(|id| !trained.contains(id))
        .collect();
    Changeset::Project {
        new_annotated_tasks: new_annotated_tasks.into_iter().collect(),
    }
}

/// Names of remote files that belong to one of `tasks`, sorted and deduplicated.
pub fn files_of_tasks(files: &[RemoteFile], tasks: &HashSet<TaskId>) -> Vec<String> {
    let names: BTreeSet<&str> = files
        .iter()
        .filter(|f| f.task_id.is_some_and(|id| tasks.contains(&id)))
        .map(|f| f.file_name.as_str())
        .collect();
    names.into_iter().map(str::to_string).collect()
}

/// Human-readable summary for the timeline.
pub fn describe(report: &ChangesetReport) -> String {
    if !report.has_baseline {
        return "No previous training, building the first dataset".to_string();
    }

    let changes: Vec<String> = report
        .changesets
        .iter()
        .filter(|c| !c.is_empty())
        .map(|c| match c {
            Changeset::TrainingSettings { current, .. } => format!(
                "Training settings have changed, actual: {}",
                current
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default()
            ),
            Changeset::Project {
                new_annotated_tasks,
            } => format!("Annotated tasks have changed, new: {:?}", new_annotated_tasks),
        })
        .collect();

    if changes.is_empty() {
        "No changes detected".to_string()
    } else {
        changes.join(", ")
    }
}
