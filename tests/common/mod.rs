//! In-memory collaborators shared by the integration tests.
#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use autotrainer::accessors::*;
use autotrainer::config::OrchestratorConfig;
use autotrainer::error::{Error, Result, TOOL_OUTDATED_MARKER};
use autotrainer::models::*;
use autotrainer::orchestrator::{Orchestrator, Project};
use autotrainer::timeline::TimelineEntrySnapshot;

pub fn image(i: usize) -> String {
    format!("img_{:04}.png", i)
}

// ============================================================
// Remote project
// ============================================================

#[derive(Default, Clone)]
struct RemoteListing {
    tasks: Vec<RemoteTask>,
    files: Vec<RemoteFile>,
    labels: Vec<ProjectLabel>,
}

#[derive(Default)]
struct RemoteState {
    server: RemoteListing,
    created: Vec<Vec<String>>,
    uploads: Vec<(TaskId, Vec<RectangleAnnotation>)>,
}

/// Annotation service double. Changes land on the server side and only show
/// up in `tasks`/`project_files`/`labels` after the next `refresh`.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<RemoteState>,
    listed: Mutex<RemoteListing>,
    pub refreshes: AtomicUsize,
    pub downloads: AtomicUsize,
}

impl FakeRemote {
    pub fn add_task(&self, id: TaskId, status: TaskStatus, files: &[String]) {
        let mut state = self.state.lock().unwrap();
        state.server.tasks.push(RemoteTask {
            id,
            name: format!("Task #{}", id),
            status,
        });
        state.server.files.extend(files.iter().map(|name| RemoteFile {
            file_name: name.clone(),
            task_id: Some(id),
        }));
    }

    pub fn set_status(&self, id: TaskId, status: TaskStatus) {
        let mut state = self.state.lock().unwrap();
        if let Some(task) = state.server.tasks.iter_mut().find(|t| t.id == id) {
            task.status = status;
        }
    }

    pub fn set_labels(&self, labels: Vec<ProjectLabel>) {
        self.state.lock().unwrap().server.labels = labels;
    }

    pub fn created_tasks(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn uploads(&self) -> Vec<(TaskId, Vec<RectangleAnnotation>)> {
        self.state.lock().unwrap().uploads.clone()
    }
}

#[async_trait]
impl RemoteProjectAccessor for FakeRemote {
    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        *self.listed.lock().unwrap() = self.state.lock().unwrap().server.clone();
        Ok(())
    }

    fn tasks(&self) -> Vec<RemoteTask> {
        self.listed.lock().unwrap().tasks.clone()
    }

    fn project_files(&self) -> Vec<RemoteFile> {
        self.listed.lock().unwrap().files.clone()
    }

    fn labels(&self) -> Vec<ProjectLabel> {
        self.listed.lock().unwrap().labels.clone()
    }

    async fn task_files(&self, task_id: TaskId) -> Result<Vec<RemoteFile>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .server
            .files
            .iter()
            .filter(|f| f.task_id == Some(task_id))
            .cloned()
            .collect())
    }

    async fn task_frames(&self, task_id: TaskId) -> Result<Vec<TaskFrame>> {
        Ok(self
            .task_files(task_id)
            .await?
            .into_iter()
            .map(|f| TaskFrame { name: f.file_name })
            .collect())
    }

    async fn download_annotations(&self, task_id: TaskId) -> Result<AnnotationFile> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(AnnotationFile {
            task_id,
            path: PathBuf::from(format!("/annotations/task_{}.zip", task_id)),
        })
    }

    async fn create_task(&self, files: &[LocalFile]) -> Result<TaskId> {
        let mut state = self.state.lock().unwrap();
        let id = state.server.tasks.iter().map(|t| t.id).max().unwrap_or(0) + 1;
        state.server.tasks.push(RemoteTask {
            id,
            name: format!("Task #{}", id),
            status: TaskStatus::New,
        });
        state.server.files.extend(files.iter().map(|f| RemoteFile {
            file_name: f.name.clone(),
            task_id: Some(id),
        }));
        state
            .created
            .push(files.iter().map(|f| f.name.clone()).collect());
        Ok(id)
    }

    async fn upload_annotations(
        &self,
        task_id: TaskId,
        shapes: &[RectangleAnnotation],
    ) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .uploads
            .push((task_id, shapes.to_vec()));
        Ok(())
    }
}

// ============================================================
// Local assets
// ============================================================

/// Image folder double; `files` lists what was on disk at the last `refresh`.
#[derive(Default)]
pub struct FakeAssets {
    disk: Mutex<Vec<LocalFile>>,
    listed: Mutex<Vec<LocalFile>>,
    pub refreshes: AtomicUsize,
}

impl FakeAssets {
    pub fn with_images(count: usize) -> Self {
        let assets = Self::default();
        *assets.disk.lock().unwrap() = (0..count)
            .map(|i| LocalFile::from_path(format!("/images/{}", image(i))))
            .collect();
        assets
    }
}

#[async_trait]
impl LocalAssetAccessor for FakeAssets {
    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        *self.listed.lock().unwrap() = self.disk.lock().unwrap().clone();
        Ok(())
    }

    fn files(&self) -> Vec<LocalFile> {
        self.listed.lock().unwrap().clone()
    }
}

// ============================================================
// Training tool
// ============================================================

/// Training tool double; `trained_models` lists what was on disk at the last
/// `refresh`.
pub struct FakeTool {
    settings: Mutex<ModelTrainingSettings>,
    models: Mutex<Vec<TrainedModel>>,
    listed: Mutex<Vec<TrainedModel>>,
    /// Remaining train calls that fail with the outdated marker.
    pub outdated_failures: AtomicUsize,
    pub fail_build: AtomicBool,
    /// Dataset builds fail with the outdated marker while set.
    pub outdated_build: AtomicBool,
    pub refreshes: AtomicUsize,
    pub builds: Mutex<Vec<DatasetRequest>>,
    pub trains: AtomicUsize,
    pub predicts: AtomicUsize,
    pub exports: AtomicUsize,
    pub updates: AtomicUsize,
    pub checks: AtomicUsize,
}

impl Default for FakeTool {
    fn default() -> Self {
        Self {
            settings: Mutex::new(ModelTrainingSettings {
                model: "yolov8n.pt".to_string(),
                model_size: 640,
                epochs: 10,
            }),
            models: Mutex::new(Vec::new()),
            listed: Mutex::new(Vec::new()),
            outdated_failures: AtomicUsize::new(0),
            fail_build: AtomicBool::new(false),
            outdated_build: AtomicBool::new(false),
            refreshes: AtomicUsize::new(0),
            builds: Mutex::new(Vec::new()),
            trains: AtomicUsize::new(0),
            predicts: AtomicUsize::new(0),
            exports: AtomicUsize::new(0),
            updates: AtomicUsize::new(0),
            checks: AtomicUsize::new(0),
        }
    }
}

impl FakeTool {
    pub fn with_model(path: &str) -> Self {
        let tool = Self::default();
        tool.models.lock().unwrap().push(TrainedModel {
            reference: TrainedModelReference::new(path),
            modified_at: at(0),
            results_image: None,
        });
        tool
    }

    pub fn set_epochs(&self, epochs: u32) {
        self.settings.lock().unwrap().epochs = epochs;
    }

    pub fn trained_count(&self) -> usize {
        self.trains.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrainingToolAccessor for FakeTool {
    async fn refresh(&self) -> Result<()> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        *self.listed.lock().unwrap() = self.models.lock().unwrap().clone();
        Ok(())
    }

    fn trained_models(&self) -> Vec<TrainedModel> {
        self.listed.lock().unwrap().clone()
    }

    fn training_settings(&self) -> ModelTrainingSettings {
        self.settings.lock().unwrap().clone()
    }

    async fn build_dataset(&self, request: DatasetRequest) -> Result<DatasetSnapshot> {
        if self.fail_build.load(Ordering::SeqCst) {
            return Err(anyhow::anyhow!("disk full").into());
        }
        if self.outdated_build.load(Ordering::SeqCst) {
            return Err(Error::from_tool_message(TOOL_OUTDATED_MARKER));
        }
        let revision = request.project.revision;
        let snapshot = DatasetSnapshot {
            index_file: PathBuf::from(format!("/datasets/rev{}/data.yaml", revision)),
            splits: SplitCounts {
                train: request.project.files.len(),
                validation: 0,
                test: 0,
            },
            project: request.project.clone(),
        };
        self.builds.lock().unwrap().push(request);
        Ok(snapshot)
    }

    async fn run_checks(&self) -> Result<()> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn train(
        &self,
        dataset: &DatasetSnapshot,
        settings: &ModelTrainingSettings,
        progress: &(dyn Fn(TrainProgress) + Send + Sync),
    ) -> Result<TrainedModel> {
        let remaining = self.outdated_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.outdated_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::from_tool_message(format!(
                "{}, please upgrade",
                TOOL_OUTDATED_MARKER
            )));
        }

        for epoch in 1..=settings.epochs {
            progress(TrainProgress {
                epoch_current: epoch,
                epoch_max: settings.epochs,
                percent: epoch as f32 * 100.0 / settings.epochs as f32,
            });
        }

        let run = self.trains.fetch_add(1, Ordering::SeqCst) + 1;
        let model = TrainedModel {
            reference: TrainedModelReference::new(format!(
                "/runs/rev{}_train{}/weights/best.pt",
                dataset.project.revision, run
            )),
            modified_at: at(run as i64),
            results_image: Some(PathBuf::from(format!("/runs/train{}/results.png", run))),
        };
        self.models.lock().unwrap().push(model.clone());
        Ok(model)
    }

    async fn predict(
        &self,
        model: &TrainedModelReference,
        files: &[LocalFile],
        progress: &(dyn Fn(PredictProgress) + Send + Sync),
    ) -> Result<PredictionSet> {
        self.predicts.fetch_add(1, Ordering::SeqCst);
        let predictions = files
            .iter()
            .enumerate()
            .map(|(i, f)| {
                progress(PredictProgress {
                    image_current: i + 1,
                    image_max: files.len(),
                    percent: (i + 1) as f32 * 100.0 / files.len() as f32,
                });
                FilePrediction {
                    file_name: f.name.clone(),
                    path: f.path.clone(),
                    labels: vec![PredictedLabel {
                        label_id: 0,
                        bbox: BoundingBox::new(0.4, 0.4, 0.2, 0.2),
                        score: Some(0.9),
                    }],
                }
            })
            .collect();
        Ok(PredictionSet {
            model: model.clone(),
            output_dir: PathBuf::from("/predict"),
            predictions,
        })
    }

    async fn export_for_cloud(&self, dataset: &DatasetSnapshot) -> Result<PathBuf> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        Ok(PathBuf::from(format!(
            "/exports/rev{}.zip",
            dataset.project.revision
        )))
    }

    async fn update(&self) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================
// Clock
// ============================================================

pub fn at(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ============================================================
// Harness
// ============================================================

pub struct Harness {
    pub remote: Arc<FakeRemote>,
    pub assets: Arc<FakeAssets>,
    pub tool: Arc<FakeTool>,
    pub orchestrator: Arc<Orchestrator>,
}

/// 40 local images; task 1 (completed) holds images 0-1, task 2 (in
/// progress) holds image 2.
pub fn harness(config: OrchestratorConfig) -> Harness {
    harness_with_tool(config, FakeTool::default())
}

pub fn harness_with_tool(config: OrchestratorConfig, tool: FakeTool) -> Harness {
    harness_with(config, tool, 40)
}

pub fn harness_with(config: OrchestratorConfig, tool: FakeTool, images: usize) -> Harness {
    let remote = Arc::new(FakeRemote::default());
    remote.add_task(1, TaskStatus::Completed, &[image(0), image(1)]);
    remote.add_task(2, TaskStatus::InProgress, &[image(2)]);
    remote.set_labels(vec![
        ProjectLabel {
            id: 7,
            name: "car".to_string(),
        },
        ProjectLabel {
            id: 3,
            name: "truck".to_string(),
        },
    ]);

    let assets = Arc::new(FakeAssets::with_images(images));
    let tool = Arc::new(tool);
    let project = Project {
        remote: remote.clone(),
        assets: assets.clone(),
        tool: tool.clone(),
    };
    let orchestrator = Arc::new(Orchestrator::with_clock(
        project,
        config,
        Arc::new(FixedClock(at(0))),
    ));

    Harness {
        remote,
        assets,
        tool,
        orchestrator,
    }
}

pub fn fast_config() -> OrchestratorConfig {
    OrchestratorConfig {
        cycle_timeout_secs: 0,
        ..OrchestratorConfig::default()
    }
}

// ============================================================
// Timeline helpers
// ============================================================

pub fn texts(entries: &[TimelineEntrySnapshot]) -> Vec<String> {
    entries.iter().map(|e| e.text.clone()).collect()
}

pub fn count_kind(entries: &[TimelineEntrySnapshot], kind: &str) -> usize {
    entries.iter().filter(|e| e.kind.as_str() == kind).count()
}

pub fn count_text(entries: &[TimelineEntrySnapshot], text: &str) -> usize {
    entries.iter().filter(|e| e.text == text).count()
}

/// Entries recorded after the last entry whose text is `marker`.
pub fn entries_after(entries: &[TimelineEntrySnapshot], marker: &str) -> Vec<TimelineEntrySnapshot> {
    let start = entries
        .iter()
        .rposition(|e| e.text == marker)
        .map_or(0, |i| i + 1);
    entries[start..].to_vec()
}

/// Poll until `condition` holds on the timeline, or fail after five seconds.
pub async fn wait_for_timeline(
    orchestrator: &Orchestrator,
    condition: impl Fn(&[TimelineEntrySnapshot]) -> bool,
) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition(&orchestrator.timeline()) {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timeline never reached the expected state: {:?}",
            texts(&orchestrator.timeline())
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
