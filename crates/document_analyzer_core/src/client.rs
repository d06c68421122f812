//! crates/document_analyzer_core/src/client.rs
//!
//! The analysis client: exactly one request/response cycle per attempt against the
//! kind-specific endpoint of the remote service, with both outcomes normalized.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::{AnalysisKind, AnalysisReport, Credential};
use crate::encoder::{encode, EncodeError};
use crate::ports::{DocumentSource, HttpTransport};

/// Message used when the remote error body carries nothing useful.
pub const GENERIC_FAILURE: &str = "Analysis failed";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    InvalidDocument(#[from] EncodeError),

    /// The service answered with a non-success status. The message is shown as is.
    #[error("{0}")]
    RemoteRejected(String),

    /// No usable response: connection failure or an unparseable success body.
    #[error("Could not reach the analysis service: {0}")]
    Transport(String),
}

/// The JSON body of an analyze request.
#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    api_key: &'a str,
    document: &'a str,
    filename: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

/// The error shape the remote service sends with non-success statuses.
#[derive(Deserialize, Default)]
struct RemoteErrorBody {
    error: Option<String>,
    details: Option<String>,
}

/// Picks the user-facing message from a rejection body: `details`, then `error`,
/// then the generic fallback. Empty strings count as absent.
pub fn rejection_message(body: &[u8]) -> String {
    let parsed: RemoteErrorBody = serde_json::from_slice(body).unwrap_or_default();
    [parsed.details, parsed.error]
        .into_iter()
        .flatten()
        .find(|m| !m.trim().is_empty())
        .unwrap_or_else(|| GENERIC_FAILURE.to_string())
}

/// Sends analyze requests to the remote service.
#[derive(Clone)]
pub struct AnalysisClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(transport: Arc<dyn HttpTransport>, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    /// Encodes `document`, sends it for analysis as `kind`, and returns the report
    /// exactly as the service produced it. No retries.
    pub async fn analyze(
        &self,
        kind: AnalysisKind,
        credential: &Credential,
        document: &dyn DocumentSource,
    ) -> Result<AnalysisReport, AnalysisError> {
        let payload = encode(document).await?;
        let filename = if payload.filename.is_empty() {
            kind.fallback_filename()
        } else {
            payload.filename.as_str()
        };

        let request = AnalyzeRequest {
            api_key: &credential.api_key,
            document: &payload.data,
            filename,
            model: credential.model.as_deref(),
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        debug!(%kind, filename, bytes = payload.byte_len, "Sending analyze request");
        let response = self
            .transport
            .post_json(&self.url(kind.endpoint_path()), &body)
            .await
            .map_err(|e| AnalysisError::Transport(e.to_string()))?;

        if !response.is_success() {
            let message = rejection_message(&response.body);
            warn!(%kind, status = response.status, %message, "Analysis rejected");
            return Err(AnalysisError::RemoteRejected(message));
        }

        AnalysisReport::from_json(kind, &response.body).map_err(|e| {
            warn!(%kind, "Malformed analysis response: {}", e);
            AnalysisError::Transport(format!("malformed response body: {}", e))
        })
    }
}
