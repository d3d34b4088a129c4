use std::path::PathBuf;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::debug;

use crate::migration::Migrator;
use reel_shared::error::ReelError;

/// Open (creating if needed) the database and bring the schema up to date.
pub async fn new(db_path: &PathBuf) -> Result<DatabaseConnection, ReelError> {
    start_db(Some(db_path)).await
}

/// `None` opens a private in-memory database.
pub async fn start_db(db_path: Option<&PathBuf>) -> Result<DatabaseConnection, ReelError> {
    let db_url = match db_path {
        Some(path) => format!("sqlite://{}?mode=rwc", path.display()),
        None => "sqlite::memory:".to_string(),
    };
    debug!("Opening Database: {db_url}");

    let mut options = ConnectOptions::new(db_url);
    options
        .sqlx_logging(true)
        .sqlx_logging_level(log::LevelFilter::Trace)
        .sqlx_slow_statements_logging_settings(log::LevelFilter::Warn, Duration::from_secs(1));
    if db_path.is_none() {
        // every pooled connection would otherwise get its own empty database
        options.max_connections(1).min_connections(1);
    }

    let conn = Database::connect(options).await?;
    Migrator::up(&conn, None).await?;
    Ok(conn)
}
