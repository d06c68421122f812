//! services/api/src/adapters/http.rs
//!
//! The reqwest-backed implementation of the `HttpTransport` port.

use async_trait::async_trait;
use document_analyzer_core::ports::{HttpTransport, TransportError, TransportResponse};
use reqwest::{Client, RequestBuilder};
use std::time::Duration;

/// Pooled HTTP client shared by the health monitors and the analysis client.
///
/// No client-wide timeout is set: analyze calls run until the service answers.
/// Only requests that pass an explicit timeout are bounded.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .pool_max_idle_per_host(8)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .build()?;
        Ok(Self { client })
    }

    async fn send(request: RequestBuilder) -> Result<TransportResponse, TransportError> {
        let response = request.send().await.map_err(map_error)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(map_error)?;
        Ok(TransportResponse { status, body })
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Connection(e.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(
        &self,
        url: &str,
        timeout: Option<Duration>,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        Self::send(request).await
    }

    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<TransportResponse, TransportError> {
        Self::send(self.client.post(url).json(body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, routing::post, Json, Router};

    /// Serves a tiny stand-in for the remote service on an ephemeral port.
    async fn spawn_stub() -> String {
        let app = Router::new()
            .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy"})) }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route(
                "/api/analyze",
                post(|Json(body): Json<serde_json::Value>| async move {
                    (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": body["filename"] })))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn get_returns_status_and_body() {
        let base = spawn_stub().await;
        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .get(&format!("{}/health", base), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(response.is_success());
        assert_eq!(&response.body[..], br#"{"status":"healthy"}"#);
    }

    #[tokio::test]
    async fn post_json_sends_body_and_keeps_error_status() {
        let base = spawn_stub().await;
        let transport = ReqwestTransport::new().unwrap();
        let response = transport
            .post_json(
                &format!("{}/api/analyze", base),
                &serde_json::json!({ "filename": "a.pdf" }),
            )
            .await
            .unwrap();
        assert_eq!(response.status, 400);
        assert_eq!(&response.body[..], br#"{"error":"a.pdf"}"#);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_timeout() {
        let base = spawn_stub().await;
        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .get(&format!("{}/slow", base), Some(Duration::from_millis(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }

    #[tokio::test]
    async fn unreachable_host_is_connection_error() {
        let transport = ReqwestTransport::new().unwrap();
        let err = transport
            .get("http://127.0.0.1:9/health", Some(Duration::from_secs(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));
    }
}
