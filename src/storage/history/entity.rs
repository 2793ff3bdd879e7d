use sea_orm::entity::prelude::*;
use serde::{Serialize, Deserialize};
use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "outcomes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub message_id: String,
    pub status: String,  // success | error
    pub trigger_type: Option<String>,
    pub job_id: Option<String>,
    pub job_name: Option<String>,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub record: String,  // 序列化后的 OutcomeRecord
    pub recorded_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
