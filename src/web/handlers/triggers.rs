use axum::{
    routing::get,
    Router,
    extract::State,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::utils::http::HttpResponse;

pub fn triggers_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/triggers", get(list_triggers))
        .with_state(dispatcher)
}

pub(crate) async fn list_triggers(State(dispatcher): State<Arc<Dispatcher>>) -> impl IntoResponse {
    Json(HttpResponse::ok(dispatcher.available_triggers()))
}
