//! crates/document_analyzer_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core depends on.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete HTTP client, database, and filesystem.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;
use std::time::Duration;

use crate::domain::{AnalysisKind, AnalysisRecord, AnalysisReport, Settings};

//=========================================================================================
// Port Error Types
//=========================================================================================

/// The request produced no usable HTTP response.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,
    #[error("Connection failed: {0}")]
    Connection(String),
}

/// A durable-storage operation failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("History storage unavailable: {0}")]
    Unavailable(String),
    #[error("History storage is corrupt: {0}")]
    Corrupt(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Settings could not be read: {0}")]
    Read(String),
    #[error("Settings could not be written: {0}")]
    Write(String),
}

/// A convenience type alias for `Result<T, StoreError>`.
pub type StoreResult<T> = Result<T, StoreError>;

//=========================================================================================
// Transport Port
//=========================================================================================

/// A raw HTTP response: status plus the unparsed body.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Issues a GET. When `timeout` is set the whole exchange is bounded by it.
    async fn get(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<TransportResponse, TransportError>;

    /// POSTs a JSON body with no caller-imposed timeout.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError>;
}

//=========================================================================================
// Document Source Port
//=========================================================================================

/// A user-selected file: a declared name and content that can be read in full.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    fn name(&self) -> &str;

    async fn read_all(&self) -> std::io::Result<Vec<u8>>;
}

/// A document on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileDocument {
    path: PathBuf,
    name: String,
}

impl FileDocument {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self { path, name }
    }
}

#[async_trait]
impl DocumentSource for FileDocument {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_all(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// A document whose bytes are already held in memory, e.g. an uploaded form part.
#[derive(Debug, Clone)]
pub struct InMemoryDocument {
    name: String,
    content: Bytes,
}

impl InMemoryDocument {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

#[async_trait]
impl DocumentSource for InMemoryDocument {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_all(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.content.to_vec())
    }
}

//=========================================================================================
// History Store Port
//=========================================================================================

/// Durable, kind-partitioned log of completed analyses.
///
/// Every method is atomic on its own. Operations on one kind never observe or
/// affect the records of the other kind.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Saves a new record under `report.kind()` and returns its freshly assigned id.
    ///
    /// Ids increase monotonically and are never reused, even after deletion.
    /// The record is durable once this returns.
    async fn append(&self, filename: &str, report: &AnalysisReport) -> StoreResult<i64>;

    /// All records of `kind`, newest first, ties broken by id descending.
    async fn list(&self, kind: AnalysisKind) -> StoreResult<Vec<AnalysisRecord>>;

    async fn get(&self, kind: AnalysisKind, id: i64) -> StoreResult<Option<AnalysisRecord>>;

    /// Deletes one record. Removing an absent id is not an error.
    async fn remove(&self, kind: AnalysisKind, id: i64) -> StoreResult<()>;

    /// Deletes every record of `kind`.
    async fn clear(&self, kind: AnalysisKind) -> StoreResult<()>;
}

//=========================================================================================
// Settings Port
//=========================================================================================

#[async_trait]
pub trait SettingsService: Send + Sync {
    /// Returns the saved settings, or the defaults if none were saved.
    async fn load(&self) -> Result<Settings, SettingsError>;

    async fn save(&self, settings: &Settings) -> Result<(), SettingsError>;

    async fn clear(&self) -> Result<(), SettingsError>;
}
