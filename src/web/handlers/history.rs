use axum::{
    routing::get,
    Router,
    extract::{State, Path, Query},
    response::IntoResponse,
    http::StatusCode,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

use crate::storage::history::HistoryStore;
use crate::storage::history::entity::Model as HistoryModel;
use crate::utils::http::HttpResponse;
use crate::web::Pagination;

pub fn history_router(history: Arc<dyn HistoryStore>) -> Router {
    Router::new()
        .route("/history", get(list_history))
        .route("/history/:message_id", get(get_history))
        .with_state(history)
}

#[derive(Debug, Serialize)]
pub struct HistoryPage {
    pub index: u64,
    pub size: u64,
    pub total: u64,
    pub items: Vec<HistoryModel>,
}

pub(crate) async fn list_history(
    State(history): State<Arc<dyn HistoryStore>>,
    Query(pagination): Query<Pagination>,
) -> impl IntoResponse {
    let pagination = pagination.check();
    let result = async {
        let items = history.list(&pagination).await?;
        let total = history.count().await?;
        anyhow::Ok(HistoryPage { index: pagination.index, size: pagination.size, total, items })
    }
    .await;

    match result {
        Ok(page) => (StatusCode::OK, Json(HttpResponse::ok(Some(page)))),
        Err(e) => {
            error!("Failed to list history: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HttpResponse::new(500, e.to_string(), None)),
            )
        }
    }
}

pub(crate) async fn get_history(
    State(history): State<Arc<dyn HistoryStore>>,
    Path(message_id): Path<String>,
) -> impl IntoResponse {
    match history.get_by_message_id(&message_id).await {
        Ok(items) if items.is_empty() => (
            StatusCode::NOT_FOUND,
            Json(HttpResponse::new(404, format!("No outcome recorded for {}", message_id), items)),
        ),
        Ok(items) => (StatusCode::OK, Json(HttpResponse::ok(items))),
        Err(e) => {
            error!("Failed to get history for {}: {}", message_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HttpResponse::new(500, e.to_string(), Vec::new())),
            )
        }
    }
}
