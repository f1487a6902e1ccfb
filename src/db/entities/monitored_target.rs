use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "monitored_targets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub url: String,
    #[sea_orm(nullable)]
    pub name: Option<String>,
    pub check_interval_seconds: i32,
    pub timeout_seconds: i32,
    pub is_active: bool,
    // Scheduling fields, written only by the scheduler while it holds the lease.
    #[sea_orm(nullable)]
    pub next_check_at: Option<ChronoDateTimeUtc>,
    #[sea_orm(nullable)]
    pub last_checked_at: Option<ChronoDateTimeUtc>,
    pub consecutive_failures: i32,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::scheduler_lease::Entity")]
    SchedulerLease,
}

impl Related<super::scheduler_lease::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SchedulerLease.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
