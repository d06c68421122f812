//! crates/document_analyzer_core/src/desk.rs
//!
//! The per-kind analysis desk: wires "analyze this file" to encoder, client and
//! history store, and keeps the in-memory view (history snapshot plus the
//! currently displayed analysis) that the UI renders.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::client::{AnalysisClient, AnalysisError};
use crate::domain::{AnalysisKind, AnalysisRecord, AnalysisReport, Credential, ServiceAvailability};
use crate::ports::{DocumentSource, HistoryStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("An API key is required")]
    MissingCredential,
    #[error("Select a document to analyze")]
    MissingDocument,
    #[error("The analysis service is offline")]
    ServiceOffline,
    #[error("No saved analysis with id {0}")]
    NotFound(i64),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What the result pane is showing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DisplayedAnalysis {
    /// Produced by an analyze call that has not made it into history.
    Fresh {
        filename: String,
        result: AnalysisReport,
    },
    /// A record from history.
    Saved { record: AnalysisRecord },
}

impl DisplayedAnalysis {
    fn record_id(&self) -> Option<i64> {
        match self {
            DisplayedAnalysis::Saved { record } => Some(record.id),
            DisplayedAnalysis::Fresh { .. } => None,
        }
    }
}

/// Outcome of a successful analyze action.
#[derive(Debug, Clone)]
pub struct CompletedAnalysis {
    pub record: AnalysisRecord,
}

struct DeskView {
    history: Vec<AnalysisRecord>,
    current: Option<DisplayedAnalysis>,
}

pub struct AnalysisDesk {
    kind: AnalysisKind,
    client: AnalysisClient,
    store: Arc<dyn HistoryStore>,
    availability: watch::Receiver<ServiceAvailability>,
    view: Mutex<DeskView>,
}

impl AnalysisDesk {
    pub fn new(
        kind: AnalysisKind,
        client: AnalysisClient,
        store: Arc<dyn HistoryStore>,
        availability: watch::Receiver<ServiceAvailability>,
    ) -> Self {
        Self {
            kind,
            client,
            store,
            availability,
            view: Mutex::new(DeskView {
                history: Vec::new(),
                current: None,
            }),
        }
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn availability(&self) -> ServiceAvailability {
        *self.availability.borrow()
    }

    pub async fn history(&self) -> Vec<AnalysisRecord> {
        self.view.lock().await.history.clone()
    }

    pub async fn current(&self) -> Option<DisplayedAnalysis> {
        self.view.lock().await.current.clone()
    }

    /// Re-reads history from the store. A failed read leaves an empty list;
    /// history is supplementary, so the error is only logged.
    pub async fn load_history(&self) -> Vec<AnalysisRecord> {
        let history = match self.store.list(self.kind).await {
            Ok(records) => records,
            Err(e) => {
                warn!(kind = %self.kind, "Failed to load history: {}", e);
                Vec::new()
            }
        };
        self.view.lock().await.history = history.clone();
        history
    }

    /// Runs one analysis end to end and saves it to history.
    ///
    /// An offline service is refused up front; `Checking` is allowed through.
    /// If saving fails the fresh result stays displayed and the store error is
    /// returned.
    pub async fn analyze(
        &self,
        credential: Option<&Credential>,
        document: Option<&dyn DocumentSource>,
    ) -> Result<CompletedAnalysis, DeskError> {
        let credential = credential
            .filter(|c| !c.api_key.trim().is_empty())
            .ok_or(DeskError::MissingCredential)?;
        let document = document.ok_or(DeskError::MissingDocument)?;
        if self.availability() == ServiceAvailability::Offline {
            return Err(DeskError::ServiceOffline);
        }

        let filename = document.name().to_string();
        info!(kind = %self.kind, %filename, "Starting analysis");
        self.view.lock().await.current = None;

        let report = self
            .client
            .analyze(self.kind, credential, document)
            .await
            .map_err(|e| {
                error!(kind = %self.kind, %filename, "Analysis failed: {}", e);
                e
            })?;

        self.view.lock().await.current = Some(DisplayedAnalysis::Fresh {
            filename: filename.clone(),
            result: report.clone(),
        });

        let id = self.store.append(&filename, &report).await.map_err(|e| {
            error!(kind = %self.kind, %filename, "Failed to save analysis: {}", e);
            e
        })?;
        let history = self.load_history().await;
        let record = match history.into_iter().find(|r| r.id == id) {
            Some(record) => record,
            None => self.saved_record(id, filename, report).await,
        };
        self.view.lock().await.current = Some(DisplayedAnalysis::Saved {
            record: record.clone(),
        });
        info!(kind = %self.kind, id, "Analysis saved to history");

        Ok(CompletedAnalysis { record })
    }

    /// The record for a just-appended id when the refreshed history lacks it, either
    /// because the listing failed or because it was deleted in the meantime. The
    /// append already succeeded, so this never fails.
    async fn saved_record(
        &self,
        id: i64,
        filename: String,
        report: AnalysisReport,
    ) -> AnalysisRecord {
        match self.store.get(self.kind, id).await {
            Ok(Some(record)) => return record,
            Ok(None) => info!(kind = %self.kind, id, "Saved analysis was removed before display"),
            Err(e) => warn!(kind = %self.kind, id, "Failed to reload saved analysis: {}", e),
        }
        AnalysisRecord {
            id,
            kind: self.kind,
            filename,
            analyzed_at: Utc::now(),
            result: report,
        }
    }

    /// Displays a stored analysis without contacting the remote service.
    pub async fn view(&self, id: i64) -> Result<AnalysisRecord, DeskError> {
        let cached = {
            let view = self.view.lock().await;
            view.history.iter().find(|r| r.id == id).cloned()
        };
        let record = match cached {
            Some(record) => record,
            None => self
                .store
                .get(self.kind, id)
                .await?
                .ok_or(DeskError::NotFound(id))?,
        };
        self.view.lock().await.current = Some(DisplayedAnalysis::Saved {
            record: record.clone(),
        });
        Ok(record)
    }

    pub async fn delete(&self, id: i64) -> Result<(), DeskError> {
        self.store.remove(self.kind, id).await?;
        self.load_history().await;

        let mut view = self.view.lock().await;
        if view.current.as_ref().and_then(DisplayedAnalysis::record_id) == Some(id) {
            view.current = None;
        }
        info!(kind = %self.kind, id, "Deleted analysis from history");
        Ok(())
    }

    pub async fn clear_history(&self) -> Result<(), DeskError> {
        self.store.clear(self.kind).await?;
        let mut view = self.view.lock().await;
        view.history.clear();
        view.current = None;
        info!(kind = %self.kind, "Cleared analysis history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgreementReport, RiskLevel};
    use crate::ports::{
        HttpTransport, InMemoryDocument, StoreResult, TransportError, TransportResponse,
    };
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Always answers analyze requests with the same canned response.
    struct FixedTransport {
        status: u16,
        body: String,
        posts: AtomicUsize,
    }

    #[async_trait]
    impl HttpTransport for FixedTransport {
        async fn get(
            &self,
            _url: &str,
            _timeout: Option<Duration>,
        ) -> Result<TransportResponse, TransportError> {
            Ok(TransportResponse::new(200, ""))
        }

        async fn post_json(
            &self,
            _url: &str,
            _body: &serde_json::Value,
        ) -> Result<TransportResponse, TransportError> {
            self.posts.fetch_add(1, Ordering::SeqCst);
            Ok(TransportResponse::new(self.status, self.body.clone()))
        }
    }

    /// A history store held in memory, optionally failing every call.
    #[derive(Default)]
    struct MemoryStore {
        records: std::sync::Mutex<Vec<AnalysisRecord>>,
        next_id: AtomicUsize,
        broken: bool,
        reads_fail: bool,
    }

    impl MemoryStore {
        fn check(&self) -> StoreResult<()> {
            if self.broken {
                Err(StoreError::Unavailable("disk full".to_string()))
            } else {
                Ok(())
            }
        }

        fn check_read(&self) -> StoreResult<()> {
            self.check()?;
            if self.reads_fail {
                Err(StoreError::Corrupt("unreadable row".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl HistoryStore for MemoryStore {
        async fn append(&self, filename: &str, report: &AnalysisReport) -> StoreResult<i64> {
            self.check()?;
            let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64 + 1;
            self.records.lock().unwrap().push(AnalysisRecord {
                id,
                kind: report.kind(),
                filename: filename.to_string(),
                analyzed_at: Utc::now(),
                result: report.clone(),
            });
            Ok(id)
        }

        async fn list(&self, kind: AnalysisKind) -> StoreResult<Vec<AnalysisRecord>> {
            self.check_read()?;
            let mut records: Vec<_> = self
                .records
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.kind == kind)
                .cloned()
                .collect();
            records.sort_by(|a, b| (b.analyzed_at, b.id).cmp(&(a.analyzed_at, a.id)));
            Ok(records)
        }

        async fn get(&self, kind: AnalysisKind, id: i64) -> StoreResult<Option<AnalysisRecord>> {
            self.check_read()?;
            Ok(self
                .records
                .lock()
                .unwrap()
                .iter()
                .find(|r| r.kind == kind && r.id == id)
                .cloned())
        }

        async fn remove(&self, kind: AnalysisKind, id: i64) -> StoreResult<()> {
            self.check()?;
            self.records
                .lock()
                .unwrap()
                .retain(|r| !(r.kind == kind && r.id == id));
            Ok(())
        }

        async fn clear(&self, kind: AnalysisKind) -> StoreResult<()> {
            self.check()?;
            self.records.lock().unwrap().retain(|r| r.kind != kind);
            Ok(())
        }
    }

    fn agreement_json() -> String {
        serde_json::to_string(&AgreementReport {
            risk_score: 88,
            risk_level: RiskLevel::Critical,
            summary: "Likely a scam.".to_string(),
            scam_indicators: vec![],
            risky_clauses: vec![],
            missing_elements: vec![],
            recommendations: vec![],
        })
        .unwrap()
    }

    struct Fixture {
        desk: AnalysisDesk,
        transport: Arc<FixedTransport>,
        availability: watch::Sender<ServiceAvailability>,
    }

    fn fixture(status: u16, body: String, store: Arc<MemoryStore>) -> Fixture {
        let transport = Arc::new(FixedTransport {
            status,
            body,
            posts: AtomicUsize::new(0),
        });
        let (availability, rx) = watch::channel(ServiceAvailability::Checking);
        let client = AnalysisClient::new(transport.clone(), "http://analyzer.test");
        Fixture {
            desk: AnalysisDesk::new(AnalysisKind::Agreement, client, store, rx),
            transport,
            availability,
        }
    }

    fn doc() -> InMemoryDocument {
        InMemoryDocument::new("offer.pdf", b"contract text".to_vec())
    }

    #[tokio::test]
    async fn analyze_saves_and_displays_record() {
        let f = fixture(200, agreement_json(), Arc::new(MemoryStore::default()));
        let credential = Credential::new("key");

        let done = f
            .desk
            .analyze(Some(&credential), Some(&doc()))
            .await
            .unwrap();

        assert_eq!(done.record.filename, "offer.pdf");
        assert_eq!(f.desk.history().await, vec![done.record.clone()]);
        assert_eq!(
            f.desk.current().await,
            Some(DisplayedAnalysis::Saved {
                record: done.record
            })
        );
    }

    #[tokio::test]
    async fn missing_inputs_and_offline_are_refused_before_any_request() {
        let f = fixture(200, agreement_json(), Arc::new(MemoryStore::default()));
        let credential = Credential::new("key");
        let blank = Credential::new("  ");

        let err = f.desk.analyze(None, Some(&doc())).await.unwrap_err();
        assert!(matches!(err, DeskError::MissingCredential));
        let err = f.desk.analyze(Some(&blank), Some(&doc())).await.unwrap_err();
        assert!(matches!(err, DeskError::MissingCredential));
        let err = f.desk.analyze(Some(&credential), None).await.unwrap_err();
        assert!(matches!(err, DeskError::MissingDocument));

        f.availability.send_replace(ServiceAvailability::Offline);
        let err = f
            .desk
            .analyze(Some(&credential), Some(&doc()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeskError::ServiceOffline));

        assert_eq!(f.transport.posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remote_rejection_message_is_surfaced_unchanged() {
        let body = r#"{"error":"Failed to parse document","details":"unsupported file type"}"#;
        let f = fixture(400, body.to_string(), Arc::new(MemoryStore::default()));

        let err = f
            .desk
            .analyze(Some(&Credential::new("key")), Some(&doc()))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "unsupported file type");
        assert!(f.desk.history().await.is_empty());
        assert!(f.desk.current().await.is_none());
    }

    #[tokio::test]
    async fn failed_save_keeps_fresh_result_and_reports_store_error() {
        let store = Arc::new(MemoryStore {
            broken: true,
            ..MemoryStore::default()
        });
        let f = fixture(200, agreement_json(), store);

        let err = f
            .desk
            .analyze(Some(&Credential::new("key")), Some(&doc()))
            .await
            .unwrap_err();

        assert!(matches!(err, DeskError::Store(_)));
        assert!(matches!(
            f.desk.current().await,
            Some(DisplayedAnalysis::Fresh { .. })
        ));
    }

    #[tokio::test]
    async fn saved_analysis_succeeds_even_if_history_cannot_be_reread() {
        let store = Arc::new(MemoryStore {
            reads_fail: true,
            ..MemoryStore::default()
        });
        let f = fixture(200, agreement_json(), store.clone());

        let done = f
            .desk
            .analyze(Some(&Credential::new("key")), Some(&doc()))
            .await
            .unwrap();

        assert_eq!(done.record.id, 1);
        assert_eq!(done.record.filename, "offer.pdf");
        assert_eq!(done.record.kind, AnalysisKind::Agreement);
        assert_eq!(store.records.lock().unwrap().len(), 1);
        assert!(f.desk.history().await.is_empty());
        assert_eq!(
            f.desk.current().await,
            Some(DisplayedAnalysis::Saved {
                record: done.record
            })
        );
    }

    #[tokio::test]
    async fn unreadable_history_degrades_to_empty() {
        let store = Arc::new(MemoryStore {
            broken: true,
            ..MemoryStore::default()
        });
        let f = fixture(200, agreement_json(), store);
        assert!(f.desk.load_history().await.is_empty());
    }

    #[tokio::test]
    async fn view_delete_and_clear_update_the_view() {
        let store = Arc::new(MemoryStore::default());
        let f = fixture(200, agreement_json(), store);
        let credential = Credential::new("key");

        let first = f
            .desk
            .analyze(Some(&credential), Some(&doc()))
            .await
            .unwrap()
            .record;
        let second = f
            .desk
            .analyze(Some(&credential), Some(&doc()))
            .await
            .unwrap()
            .record;
        let posts_before_view = f.transport.posts.load(Ordering::SeqCst);

        assert_eq!(f.desk.view(first.id).await.unwrap(), first);
        assert_eq!(f.transport.posts.load(Ordering::SeqCst), posts_before_view);
        assert!(matches!(
            f.desk.view(999).await.unwrap_err(),
            DeskError::NotFound(999)
        ));

        f.desk.delete(first.id).await.unwrap();
        assert!(f.desk.current().await.is_none());
        assert_eq!(f.desk.history().await, vec![second.clone()]);

        // Deleting again is harmless.
        f.desk.delete(first.id).await.unwrap();

        f.desk.view(second.id).await.unwrap();
        f.desk.clear_history().await.unwrap();
        assert!(f.desk.history().await.is_empty());
        assert!(f.desk.current().await.is_none());
    }
}
