//! Connection pool setup.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::str::FromStr;

/// Default pool size when none is configured.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Open a `SQLite` pool at `path`, creating the file if needed.
///
/// `:memory:` yields an in-memory database shared by every connection of
/// the pool.
pub async fn open_pool(path: impl AsRef<Path>, max_connections: u32) -> Result<Pool<Sqlite>> {
    let path_str = path.as_ref().to_str().ok_or_else(|| {
        DatabaseError::Open("invalid database path: not valid UTF-8".to_string())
    })?;

    let mut connect_options = SqliteConnectOptions::from_str(path_str)
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?
        .foreign_keys(true)
        .create_if_missing(true);
    if path_str != ":memory:" {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("failed to initialize pool: {e}")))?;

    tracing::info!("Database pool created at {}", path_str);
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_in_memory() {
        let pool = open_pool(":memory:", 2).await.expect("open pool");
        let one: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&pool)
            .await
            .expect("query");
        assert_eq!(one, 1);
    }

    #[tokio::test]
    async fn test_creates_missing_file() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("shortwatch.db");

        let pool = open_pool(&path, DEFAULT_MAX_CONNECTIONS)
            .await
            .expect("open pool");
        pool.close().await;

        assert!(path.exists());
    }
}
