use chrono::{DateTime, TimeZone, Utc};
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};

use crate::db::entities::monitored_target;
use crate::db::schema;

/// Fresh in-memory SQLite database with the full schema. One connection so
/// every query sees the same memory database.
pub(crate) async fn memory_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:".to_owned());
    opt.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(opt).await.unwrap();
    schema::create_tables(&db).await.unwrap();
    db
}

pub(crate) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
}

pub(crate) async fn insert_target(
    db: &DatabaseConnection,
    url: &str,
    check_interval_seconds: i32,
    next_check_at: Option<DateTime<Utc>>,
) -> monitored_target::Model {
    monitored_target::ActiveModel {
        url: Set(url.to_string()),
        name: Set(None),
        check_interval_seconds: Set(check_interval_seconds),
        timeout_seconds: Set(5),
        is_active: Set(true),
        next_check_at: Set(next_check_at),
        last_checked_at: Set(None),
        consecutive_failures: Set(0),
        created_at: Set(at(0)),
        updated_at: Set(at(0)),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
