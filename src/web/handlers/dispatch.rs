use axum::{
    routing::post,
    Router,
    extract::{State, Json},
    response::IntoResponse,
    http::StatusCode,
};
use std::sync::Arc;

use crate::dispatch::{DispatchEvent, Dispatcher, TransportRecord};
use crate::utils::http::HttpResponse;

pub fn dispatch_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/dispatch", post(dispatch_event))
        .route("/dispatch/record", post(dispatch_record))
        .with_state(dispatcher)
}

// 批量投递：全部成功返回 200，否则 400
pub(crate) async fn dispatch_event(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(event): Json<DispatchEvent>,
) -> impl IntoResponse {
    let report = dispatcher.process_event(&event).await;
    let (status, message) = if report.all_succeeded() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::BAD_REQUEST, "one or more records failed")
    };

    (
        status,
        Json(HttpResponse::new(status.as_u16(), message.to_string(), report)),
    )
}

pub(crate) async fn dispatch_record(
    State(dispatcher): State<Arc<Dispatcher>>,
    Json(record): Json<TransportRecord>,
) -> impl IntoResponse {
    let outcome = dispatcher.process_record(&record).await;
    let status = if outcome.is_success() { StatusCode::OK } else { StatusCode::BAD_REQUEST };

    (
        status,
        Json(HttpResponse::new(status.as_u16(), status.canonical_reason().unwrap_or("").to_string(), outcome)),
    )
}
