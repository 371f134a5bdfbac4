mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::orchestrator::Orchestrator;

pub fn create_router(orchestrator: Arc<Orchestrator>) -> Router {
    let api = Router::new()
        // Loop control
        .route("/status", get(handlers::get_status))
        .route("/trainer/start", post(handlers::start_trainer))
        .route("/trainer/stop", post(handlers::stop_trainer))
        // Timeline
        .route(
            "/timeline",
            get(handlers::get_timeline).delete(handlers::clear_timeline),
        )
        // Model
        .route(
            "/model",
            get(handlers::get_model).put(handlers::select_model),
        )
        // Tasks
        .route("/tasks/next", post(handlers::create_next_task))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(orchestrator)
}
