//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `HistoryStore` port from the `core` crate. It keeps each analysis kind in
//! its own SQLite table using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use document_analyzer_core::domain::{AnalysisKind, AnalysisRecord, AnalysisReport};
use document_analyzer_core::ports::{HistoryStore, StoreError, StoreResult};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `HistoryStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: SqlitePool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens (creating if needed) the database at `database_url`.
    pub async fn connect(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Ok(Self::new(pool))
    }

    /// An isolated in-memory database. A single connection, since every
    /// SQLite memory connection is its own database.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Ok(Self::new(pool))
    }

    /// Creates one table per analysis kind, plus the `analyzed_at` index. Idempotent.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        for kind in AnalysisKind::ALL {
            let table = kind.collection();
            // AUTOINCREMENT keeps ids from being reused after deletes.
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    filename TEXT NOT NULL,
                    analyzed_at TEXT NOT NULL,
                    result TEXT NOT NULL
                )
                "#
            ))
            .execute(&self.pool)
            .await?;

            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_analyzed_at ON {table}(analyzed_at)"
            ))
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct HistoryRow {
    id: i64,
    filename: String,
    analyzed_at: String,
    result: String,
}

impl HistoryRow {
    fn to_domain(self, kind: AnalysisKind) -> StoreResult<AnalysisRecord> {
        let analyzed_at = DateTime::parse_from_rfc3339(&self.analyzed_at)
            .map_err(|e| {
                StoreError::Corrupt(format!("record {} has a bad timestamp: {}", self.id, e))
            })?
            .with_timezone(&Utc);
        let result = AnalysisReport::from_json(kind, self.result.as_bytes()).map_err(|e| {
            StoreError::Corrupt(format!("record {} has an unreadable result: {}", self.id, e))
        })?;
        Ok(AnalysisRecord {
            id: self.id,
            kind,
            filename: self.filename,
            analyzed_at,
            result,
        })
    }
}

/// Fixed-width UTC timestamps sort lexicographically in time order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn unavailable(e: sqlx::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

//=========================================================================================
// `HistoryStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl HistoryStore for DbAdapter {
    async fn append(&self, filename: &str, report: &AnalysisReport) -> StoreResult<i64> {
        let table = report.kind().collection();
        let result =
            serde_json::to_string(report).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let id: i64 = sqlx::query_scalar(&format!(
            "INSERT INTO {table} (filename, analyzed_at, result) VALUES (?, ?, ?) RETURNING id"
        ))
        .bind(filename)
        .bind(format_timestamp(Utc::now()))
        .bind(result)
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(id)
    }

    async fn list(&self, kind: AnalysisKind) -> StoreResult<Vec<AnalysisRecord>> {
        let table = kind.collection();
        let rows: Vec<HistoryRow> = sqlx::query_as(&format!(
            "SELECT id, filename, analyzed_at, result FROM {table} ORDER BY analyzed_at DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.into_iter().map(|r| r.to_domain(kind)).collect()
    }

    async fn get(&self, kind: AnalysisKind, id: i64) -> StoreResult<Option<AnalysisRecord>> {
        let table = kind.collection();
        let row: Option<HistoryRow> = sqlx::query_as(&format!(
            "SELECT id, filename, analyzed_at, result FROM {table} WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(|r| r.to_domain(kind)).transpose()
    }

    async fn remove(&self, kind: AnalysisKind, id: i64) -> StoreResult<()> {
        let table = kind.collection();
        sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn clear(&self, kind: AnalysisKind) -> StoreResult<()> {
        let table = kind.collection();
        sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }
}
