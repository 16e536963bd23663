use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool as SqlxSqlitePool,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::error::Result;

pub type SqlitePool = SqlxSqlitePool;

#[derive(Clone)]
pub struct SqliteClient {
    pool: SqlitePool,
    db_path: String,
}

impl SqliteClient {
    /// Open (or create) a database file tuned for a small single-board host
    pub async fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let db_path_str = db_path.as_ref().to_string_lossy().to_string();

        if let Some(parent) = db_path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&db_path_str)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        info!("SQLite database connected: {}", db_path_str);

        Ok(Self {
            pool,
            db_path: db_path_str,
        })
    }

    /// Private in-memory database
    ///
    /// Limited to a single connection: every new connection to `:memory:`
    /// would otherwise see its own empty database.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self {
            pool,
            db_path: ":memory:".to_string(),
        })
    }

    /// Get the underlying connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Get database file path
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Check if database is accessible
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_database_created_with_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("pill.db");

        let client = SqliteClient::new(&path).await.unwrap();
        client.ping().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_in_memory_enforces_foreign_keys() {
        let client = SqliteClient::in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(client.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 1);
    }
}
