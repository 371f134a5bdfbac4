use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::models::*;
use crate::orchestrator::{Orchestrator, OrchestratorStatus};
use crate::timeline::{CancellationToken, TimelineEntrySnapshot};

// ============================================================
// Error Handling
// ============================================================

/// Map an orchestrator error to a response.
///
/// Calling start/stop in the wrong state is a conflict and inconsistencies
/// are reported as-is. Anything else is logged server-side and clients only
/// see a generic message.
fn api_error(e: Error) -> (StatusCode, String) {
    if e.is_usage() {
        tracing::warn!("Rejected request: {}", e);
        return (StatusCode::CONFLICT, e.to_string());
    }

    if let Error::Inconsistent(_) = e {
        tracing::warn!("Validation error: {}", e);
        return (StatusCode::BAD_REQUEST, e.to_string());
    }

    tracing::error!("Internal error: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

// ============================================================
// Health
// ============================================================

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================
// Loop control
// ============================================================

pub async fn get_status(State(orchestrator): State<Arc<Orchestrator>>) -> Json<OrchestratorStatus> {
    Json(orchestrator.status().await)
}

pub async fn start_trainer(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<StatusCode, (StatusCode, String)> {
    orchestrator.start().await.map_err(api_error)?;
    Ok(StatusCode::ACCEPTED)
}

pub async fn stop_trainer(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<StatusCode, (StatusCode, String)> {
    orchestrator.stop().await.map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Timeline
// ============================================================

pub async fn get_timeline(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Json<Vec<TimelineEntrySnapshot>> {
    Json(orchestrator.timeline())
}

pub async fn clear_timeline(State(orchestrator): State<Arc<Orchestrator>>) -> StatusCode {
    orchestrator.clear_timeline();
    StatusCode::NO_CONTENT
}

// ============================================================
// Model
// ============================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelSelection {
    pub model: Option<TrainedModelReference>,
}

pub async fn get_model(State(orchestrator): State<Arc<Orchestrator>>) -> Json<ModelSelection> {
    Json(ModelSelection {
        model: orchestrator.selected_model(),
    })
}

pub async fn select_model(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(input): Json<ModelSelection>,
) -> Json<ModelSelection> {
    orchestrator.select_model(input.model);
    Json(ModelSelection {
        model: orchestrator.selected_model(),
    })
}

// ============================================================
// Tasks
// ============================================================

pub async fn create_next_task(
    State(orchestrator): State<Arc<Orchestrator>>,
) -> Result<(StatusCode, Json<CreatedTask>), (StatusCode, String)> {
    orchestrator
        .create_next_task(&CancellationToken::new())
        .await
        .map_err(api_error)?
        .map(|task| (StatusCode::CREATED, Json(task)))
        .ok_or((
            StatusCode::CONFLICT,
            "Task creation was cancelled".to_string(),
        ))
}
