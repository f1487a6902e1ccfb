use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only history of probe outcomes.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "check_results")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub target_url: String,
    pub timeout_seconds: i32,
    /// Tag of the outcome class, see `CheckOutcomeKind`.
    pub outcome: String,
    #[sea_orm(nullable)]
    pub status_code: Option<i32>,
    pub is_healthy: bool,
    #[sea_orm(nullable)]
    pub response_time_ms: Option<f64>,
    #[sea_orm(nullable)]
    pub error_message: Option<String>,
    pub observed_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
