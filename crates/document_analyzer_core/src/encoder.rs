//! crates/document_analyzer_core/src/encoder.rs
//!
//! Turns a user-selected document into a text-safe payload for the JSON request body.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::ports::DocumentSource;

/// The document could not be read in full.
#[derive(Debug, thiserror::Error)]
#[error("Failed to read '{filename}': {source}")]
pub struct EncodeError {
    pub filename: String,
    #[source]
    pub source: std::io::Error,
}

/// A whole document as standard base64, without any data-URL prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPayload {
    pub filename: String,
    pub data: String,
    /// Size of the original content in bytes.
    pub byte_len: usize,
}

impl EncodedPayload {
    /// Decodes the payload back to the original bytes.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

/// Reads the entire document and base64-encodes it.
pub async fn encode(source: &dyn DocumentSource) -> Result<EncodedPayload, EncodeError> {
    let content = source.read_all().await.map_err(|source_err| EncodeError {
        filename: source.name().to_string(),
        source: source_err,
    })?;

    Ok(EncodedPayload {
        filename: source.name().to_string(),
        data: STANDARD.encode(&content),
        byte_len: content.len(),
    })
}

/// Strips a `data:<mime>;base64,` prefix if present, the form browsers hand out
/// for file reads.
pub fn strip_data_url_prefix(payload: &str) -> &str {
    match payload.strip_prefix("data:") {
        Some(rest) => rest.split_once(',').map_or(payload, |(_, data)| data),
        None => payload,
    }
}
