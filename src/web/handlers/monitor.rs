use axum::{
    routing::post,
    Router,
    extract::State,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::monitor::{JobMonitor, JobStateChangeEvent};
use crate::utils::http::HttpResponse;

pub fn monitor_router(monitor: Arc<JobMonitor>) -> Router {
    Router::new()
        .route("/events/job-state", post(job_state_changed))
        .with_state(monitor)
}

pub(crate) async fn job_state_changed(
    State(monitor): State<Arc<JobMonitor>>,
    Json(event): Json<JobStateChangeEvent>,
) -> impl IntoResponse {
    let report = monitor.handle(&event).await;
    Json(HttpResponse::ok(report))
}
