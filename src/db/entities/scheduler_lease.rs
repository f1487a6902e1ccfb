use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// At most one row per target. A row whose `expires_at` is not in the future
/// is logically absent and may be overwritten by any holder.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[sea_orm(table_name = "scheduler_leases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub target_id: i32,
    pub holder_id: String,
    pub acquired_at: ChronoDateTimeUtc,
    pub expires_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::monitored_target::Entity",
        from = "Column::TargetId",
        to = "super::monitored_target::Column::Id",
        on_delete = "Cascade"
    )]
    MonitoredTarget,
}

impl Related<super::monitored_target::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonitoredTarget.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_live(&self, now: ChronoDateTimeUtc) -> bool {
        self.expires_at > now
    }
}
