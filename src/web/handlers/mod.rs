use axum::Router;
use std::sync::Arc;
use crate::AppContext;

pub mod dispatch;
pub mod history;
pub mod monitor;
pub mod triggers;

pub fn router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .merge(dispatch::dispatch_router(ctx.dispatcher.clone()))
        .merge(triggers::triggers_router(ctx.dispatcher.clone()))
        .merge(history::history_router(ctx.history.clone()))
        .merge(monitor::monitor_router(ctx.monitor.clone()))
}
