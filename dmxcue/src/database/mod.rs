//! Database module for dmxcue.
//!
//! SQLite persistence through sqlx: connection pool management, models and
//! repositories for timelines, system settings and the event log, plus the
//! maintenance task that expires old events.

pub mod maintenance;
pub mod models;
pub mod repositories;
pub mod time;

pub use maintenance::{MaintenanceConfig, MaintenanceScheduler};

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};

pub type DbPool = Pool<Sqlite>;

/// The service writes rarely; a handful of connections covers the API and
/// the event log writer.
const POOL_SIZE: u32 = 4;

const BUSY_TIMEOUT: Duration = Duration::from_secs(15);

/// Open a pool on `database_url` (e.g. `sqlite:dmxcue.db?mode=rwc`).
pub async fn init_pool(database_url: &str) -> crate::Result<DbPool> {
    connect(database_url, POOL_SIZE).await
}

/// Open a single-connection in-memory database with migrations applied.
///
/// Each in-memory connection is its own database, hence one connection.
pub async fn init_memory_pool() -> crate::Result<DbPool> {
    let pool = connect("sqlite::memory:", 1).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}

async fn connect(database_url: &str, max_connections: u32) -> crate::Result<DbPool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(BUSY_TIMEOUT)
        .pragma("temp_store", "MEMORY");

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    tracing::info!(url = database_url, max_connections, "Database pool ready");
    Ok(pool)
}

pub async fn run_migrations(pool: &DbPool) -> crate::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::debug!("Database schema up to date");
    Ok(())
}
