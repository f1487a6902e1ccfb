//! Idempotent schema bootstrap derived from the entity definitions.

use sea_orm::sea_query::{Index, IndexCreateStatement};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, Schema};
use tracing::info;

use crate::db::entities::{check_result, monitored_target, scheduler_lease};

fn indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .if_not_exists()
            .name("idx_monitored_targets_active_next_check")
            .table(monitored_target::Entity)
            .col(monitored_target::Column::IsActive)
            .col(monitored_target::Column::NextCheckAt)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_scheduler_leases_expires_at")
            .table(scheduler_lease::Entity)
            .col(scheduler_lease::Column::ExpiresAt)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_check_results_observed_at")
            .table(check_result::Entity)
            .col(check_result::Column::ObservedAt)
            .to_owned(),
        Index::create()
            .if_not_exists()
            .name("idx_check_results_target_url")
            .table(check_result::Entity)
            .col(check_result::Column::TargetUrl)
            .to_owned(),
    ]
}

async fn create_table<E: EntityTrait>(
    db: &DatabaseConnection,
    schema: &Schema,
    entity: E,
) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}

/// Creates missing tables and indexes. Safe to run repeatedly.
pub async fn create_tables(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Parents before children for the lease foreign key.
    create_table(db, &schema, monitored_target::Entity).await?;
    create_table(db, &schema, scheduler_lease::Entity).await?;
    create_table(db, &schema, check_result::Entity).await?;

    for index in indexes() {
        db.execute(backend.build(&index)).await?;
    }

    info!("Database schema is ready.");
    Ok(())
}
