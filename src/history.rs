//! Durable log of completed games
//!
//! Append-only SQLite table behind the `HistorySink` trait. The game core only
//! ever appends; reads serve the `/history` endpoint.

use crate::types::{GameRecord, HistoryRecord};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Where completed games go
#[async_trait]
pub trait HistorySink: Send + Sync {
    /// Persist one completed game
    async fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError>;

    /// Most recent games, newest first
    async fn recent(&self, limit: u32) -> Result<Vec<GameRecord>, HistoryError>;
}

/// SQLite-backed history
#[derive(Clone)]
pub struct SqliteHistory {
    pool: SqlitePool,
}

impl SqliteHistory {
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// `:memory:` gives a private in-memory database.
    pub async fn open(path: &str) -> Result<Self, HistoryError> {
        let pool = if path == ":memory:" {
            // Unique name per call so parallel tests don't share one database
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let uri = format!(
                "file:onetoten-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );
            let options = SqliteConnectOptions::new()
                .filename(&uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = std::fs::create_dir_all(parent) {
                        tracing::warn!(path = %parent.display(), error = %e, "Failed to create database directory");
                    }
                }
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .connect_with(options)
                .await?
        };

        tracing::info!(path = %path, "History database connected");

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("History migrations checked/applied");

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl HistorySink for SqliteHistory {
    async fn append(&self, record: &HistoryRecord) -> Result<(), HistoryError> {
        // Same layout as SQLite's CURRENT_TIMESTAMP so ordering stays lexical
        let created_at = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        sqlx::query(
            r#"
            INSERT INTO games (room_code, player1_name, player2_name, challenge, max_number,
                               player1_number, player2_number, matched, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.room_code)
        .bind(&record.player1_name)
        .bind(&record.player2_name)
        .bind(&record.challenge)
        .bind(record.max_number as i64)
        .bind(record.player1_number as i64)
        .bind(record.player2_number as i64)
        .bind(record.matched as i64)
        .bind(created_at)
        .execute(&self.pool)
        .await?;

        tracing::debug!(room = %record.room_code, matched = record.matched, "Game recorded");
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<GameRecord>, HistoryError> {
        let rows = sqlx::query_as::<_, GameRecord>(
            r#"
            SELECT id, room_code, player1_name, player2_name, challenge, max_number,
                   player1_number, player2_number, matched,
                   CAST(created_at AS TEXT) AS created_at
            FROM games
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
