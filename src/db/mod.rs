use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use std::time::Duration;

pub mod entities;
pub mod enums;
pub mod schema;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

/// Opens the connection pool and checks that the database answers.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    db.ping().await?;
    Ok(db)
}
