//! Shortwatch Database Layer
//!
//! Provides `SQLite` persistence for managers, issuers, positions and run
//! audits. Uses `SQLx` with embedded, versioned migrations.
//!
//! # Architecture
//!
//! - **Migrations**: SQL migrations are embedded at compile time and tracked by `SQLx`
//! - **Connection Pooling**: Configurable pool size (default: 5 connections)
//! - **Tables**: one module of free functions per table, all taking a `&SqlitePool`
//!
//! # Example
//!
//! ```ignore
//! use shortwatch_db::Database;
//!
//! let db = Database::new("shortwatch.db").await?;
//! db.run_migrations().await?;
//! let totals = shortwatch_db::positions::jurisdiction_totals(db.pool()).await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
pub mod issuers;
pub mod managers;
pub mod migrations;
pub mod positions;
pub mod run_audits;

// Re-export commonly used types
pub use error::{DatabaseError, Result};
pub use positions::{JurisdictionTotals, StoredVerdict};

use shortwatch_core::DatabaseConfig;
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// High-level database handle owning the connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open the database at `path` with the default pool size.
    ///
    /// # Arguments
    /// * `path` - Path to the database file (or `:memory:` for in-memory)
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_max_connections(path, connection::DEFAULT_MAX_CONNECTIONS).await
    }

    /// Open the database at `path` with an explicit pool size.
    pub async fn with_max_connections(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let pool = connection::open_pool(path, max_connections).await?;
        Ok(Self { pool })
    }

    /// Open the database described by the `[database]` config section,
    /// creating the parent directory and applying migrations.
    pub async fn open(path: impl AsRef<Path>, config: &DatabaseConfig) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let db = Self::with_max_connections(path, config.max_connections).await?;
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run all pending database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_creates_directory_and_schema() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join("shortwatch.db");

        let db = Database::open(&path, &DatabaseConfig::default())
            .await
            .expect("open database");

        assert!(db.get_schema_version().await.expect("version") > 0);
        db.close().await;
        assert!(path.exists());
    }
}
