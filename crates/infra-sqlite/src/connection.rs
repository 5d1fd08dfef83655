// SQLite Connection Pool Setup

use jobrelay_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Create SQLite connection pool with WAL mode.
///
/// Accepts a plain file path or a `sqlite:` URL. In-memory databases are
/// limited to one connection so every query sees the same database.
pub async fn create_pool(database: &str) -> Result<SqlitePool> {
    let url = if database.starts_with("sqlite:") {
        database.to_string()
    } else {
        format!("sqlite://{}", database)
    };
    let in_memory = url.contains(":memory:");

    let options = SqliteConnectOptions::from_str(&url)
        .map_err(|e| AppError::Config(format!("Invalid database path {}: {}", database, e)))?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5))
        .create_if_missing(true);

    let max_connections = if in_memory { 1 } else { 10 };
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_memory_pool() {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        assert!(pool.acquire().await.is_ok());
    }
}
