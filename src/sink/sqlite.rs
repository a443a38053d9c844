//! SQLite sink: one row per processed file.
//!
//! Rows carry a generated UUID, the measurement file name, and the JSON
//! payload as a blob.

use super::{FileIdentifier, RecordSink};
use crate::error::SinkError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::debug;
use uuid::Uuid;

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS measurement_files (
        id TEXT PRIMARY KEY NOT NULL,
        file_name TEXT NOT NULL,
        data BLOB NOT NULL,
        created_at TEXT NOT NULL
    )
"#;

/// Inserts one `measurement_files` row per converted file.
pub struct SqliteSink {
    db: SqlitePool,
}

impl SqliteSink {
    /// Opens (creating if needed) the database and ensures the table exists.
    pub async fn connect(database_url: &str) -> Result<Self, SinkError> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| SinkError::Database(e.to_string()))?
            .create_if_missing(true);
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| SinkError::Database(e.to_string()))?;
        Self::with_pool(db).await
    }

    /// Wraps an existing pool and ensures the table exists.
    pub async fn with_pool(db: SqlitePool) -> Result<Self, SinkError> {
        sqlx::query(CREATE_TABLE)
            .execute(&db)
            .await
            .map_err(|e| SinkError::Database(e.to_string()))?;
        Ok(Self { db })
    }

    /// Underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.db
    }
}

#[async_trait]
impl RecordSink for SqliteSink {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn persist(&self, file: &FileIdentifier, payload: &[u8]) -> Result<(), SinkError> {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO measurement_files (id, file_name, data, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&file.file_name)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await
        .map_err(|e| SinkError::Database(e.to_string()))?;

        debug!(id = %id, file = %file.file_name, bytes = payload.len(), "row inserted");
        Ok(())
    }
}
