use async_trait::async_trait;
use anyhow::Result;
use crate::dispatch::OutcomeRecord;
use crate::storage::history::entity::Model as HistoryModel;
use crate::web::Pagination;
pub mod sqlite;
pub mod entity;
pub mod mapping;

/// Append-only log of dispatch outcomes.
#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
    async fn append(&self, outcome: &OutcomeRecord) -> Result<()>;
    /// Newest first.
    async fn list(&self, pagination: &Pagination) -> Result<Vec<HistoryModel>>;
    async fn get_by_message_id(&self, message_id: &str) -> Result<Vec<HistoryModel>>;
    async fn count(&self) -> Result<u64>;
}
