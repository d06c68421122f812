//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::state::AppState;
use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Utc};
use document_analyzer_core::domain::{
    AnalysisKind, AnalysisRecord, AnalysisReport, Credential, ModelOption, ServiceAvailability,
    Settings, AVAILABLE_MODELS,
};
use document_analyzer_core::encoder::strip_data_url_prefix;
use document_analyzer_core::ports::{DocumentSource, InMemoryDocument};
use document_analyzer_core::{AnalysisError, DeskError, DisplayedAnalysis};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        status_handler,
        analyze_handler,
        list_history_handler,
        view_history_handler,
        delete_history_item_handler,
        clear_history_handler,
        current_handler,
        get_settings_handler,
        put_settings_handler,
        delete_settings_handler,
        list_models_handler,
    ),
    components(
        schemas(StatusResponse, HistoryItem, CurrentAnalysis, SettingsPayload, ModelResponse)
    ),
    tags(
        (name = "Document Analyzer", description = "Local endpoints for analyzing agreements and resumes and browsing past analyses.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    #[schema(value_type = String, example = "agreement")]
    kind: AnalysisKind,
    #[schema(value_type = String, example = "online")]
    availability: ServiceAvailability,
}

/// A saved analysis as shown in the history list.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct HistoryItem {
    pub id: i64,
    pub filename: String,
    pub analyzed_at: DateTime<Utc>,
    /// The report exactly as the analysis service returned it.
    #[schema(value_type = Object)]
    pub result: serde_json::Value,
}

impl HistoryItem {
    fn from_record(record: &AnalysisRecord) -> Self {
        Self {
            id: record.id,
            filename: record.filename.clone(),
            analyzed_at: record.analyzed_at,
            result: report_json(&record.result),
        }
    }
}

/// The analysis currently on screen: fresh from the service, or loaded from history.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct CurrentAnalysis {
    /// `fresh` or `saved`.
    pub source: String,
    pub id: Option<i64>,
    pub filename: String,
    #[schema(value_type = Object)]
    pub result: serde_json::Value,
}

impl CurrentAnalysis {
    fn from_displayed(displayed: &DisplayedAnalysis) -> Self {
        match displayed {
            DisplayedAnalysis::Fresh { filename, result } => Self {
                source: "fresh".to_string(),
                id: None,
                filename: filename.clone(),
                result: report_json(result),
            },
            DisplayedAnalysis::Saved { record } => Self {
                source: "saved".to_string(),
                id: Some(record.id),
                filename: record.filename.clone(),
                result: report_json(&record.result),
            },
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPayload {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub use_own_key: bool,
}

impl From<Settings> for SettingsPayload {
    fn from(settings: Settings) -> Self {
        Self {
            api_key: settings.api_key,
            model: settings.model,
            use_own_key: settings.use_own_key,
        }
    }
}

impl From<SettingsPayload> for Settings {
    fn from(payload: SettingsPayload) -> Self {
        let defaults = Settings::default();
        Self {
            api_key: payload.api_key.trim().to_string(),
            model: if payload.model.is_empty() {
                defaults.model
            } else {
                payload.model
            },
            use_own_key: payload.use_own_key,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ModelResponse {
    id: String,
    name: String,
}

impl From<&ModelOption> for ModelResponse {
    fn from(option: &ModelOption) -> Self {
        Self {
            id: option.id.to_string(),
            name: option.name.to_string(),
        }
    }
}

fn report_json(report: &AnalysisReport) -> serde_json::Value {
    report.body().clone()
}

//=========================================================================================
// Error Mapping
//=========================================================================================

type HandlerError = (StatusCode, String);

/// Maps a desk failure onto a status code, keeping its message unchanged.
fn desk_error(e: DeskError) -> HandlerError {
    let status = match &e {
        DeskError::MissingCredential | DeskError::MissingDocument => StatusCode::BAD_REQUEST,
        DeskError::ServiceOffline => StatusCode::SERVICE_UNAVAILABLE,
        DeskError::NotFound(_) => StatusCode::NOT_FOUND,
        DeskError::Analysis(AnalysisError::InvalidDocument(_)) => StatusCode::BAD_REQUEST,
        DeskError::Analysis(AnalysisError::RemoteRejected(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        DeskError::Analysis(AnalysisError::Transport(_)) => StatusCode::BAD_GATEWAY,
        DeskError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }
    (status, e.to_string())
}

fn bad_request(message: impl Into<String>) -> HandlerError {
    (StatusCode::BAD_REQUEST, message.into())
}

/// Keeps axum's status for multipart failures, so oversized uploads get 413.
fn multipart_error(context: &str, e: MultipartError) -> HandlerError {
    (e.status(), format!("{}: {}", context, e.body_text()))
}

//=========================================================================================
// Availability
//=========================================================================================

/// Current availability of the remote analysis service, as seen by this kind's monitor.
#[utoipa::path(
    get,
    path = "/{kind}/status",
    params(("kind" = String, Path, description = "`agreement` or `resume`")),
    responses((status = 200, description = "Availability", body = StatusResponse))
)]
pub async fn status_handler(
    State(app_state): State<Arc<AppState>>,
    Path(kind): Path<AnalysisKind>,
) -> Json<StatusResponse> {
    Json(StatusResponse {
        kind,
        availability: app_state.desk(kind).availability(),
    })
}

//=========================================================================================
// Analysis
//=========================================================================================

/// The pieces of an analyze form.
#[derive(Default)]
struct AnalyzeForm {
    document: Option<InMemoryDocument>,
    data_url: Option<String>,
    filename: Option<String>,
    api_key: Option<String>,
}

async fn read_form(mut multipart: Multipart) -> Result<AnalyzeForm, HandlerError> {
    let mut form = AnalyzeForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Failed to read multipart data", e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file bytes", e))?;
                form.document = Some(InMemoryDocument::new(file_name, data));
            }
            "document" | "filename" | "api_key" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(&format!("Failed to read field '{}'", name), e))?;
                match name.as_str() {
                    "document" => form.data_url = Some(text),
                    "filename" => form.filename = Some(text),
                    _ => form.api_key = Some(text),
                }
            }
            _ => {}
        }
    }
    Ok(form)
}

impl AnalyzeForm {
    /// The uploaded file, or the document given as a data URL / base64 text part.
    fn into_document(self) -> Result<Option<InMemoryDocument>, HandlerError> {
        if let Some(document) = self.document {
            return Ok(Some(document));
        }
        let Some(data_url) = self.data_url.filter(|d| !d.trim().is_empty()) else {
            return Ok(None);
        };
        let content = STANDARD
            .decode(strip_data_url_prefix(data_url.trim()))
            .map_err(|e| bad_request(format!("Document is not valid base64: {}", e)))?;
        Ok(Some(InMemoryDocument::new(
            self.filename.unwrap_or_default(),
            content,
        )))
    }
}

/// Analyze a document and save the result to history.
///
/// Accepts multipart/form-data with a `file` part, or a `document` part holding a
/// data URL plus a `filename` part. An `api_key` part overrides the saved key.
#[utoipa::path(
    post,
    path = "/{kind}/analyze",
    params(("kind" = String, Path, description = "`agreement` or `resume`")),
    request_body(content_type = "multipart/form-data", description = "The document to analyze."),
    responses(
        (status = 201, description = "Analysis completed and saved", body = HistoryItem),
        (status = 400, description = "Missing API key or document"),
        (status = 413, description = "The upload exceeds the size limit"),
        (status = 422, description = "The analysis service rejected the document"),
        (status = 502, description = "The analysis service could not be reached"),
        (status = 503, description = "The analysis service is offline"),
        (status = 500, description = "The analysis could not be saved")
    )
)]
pub async fn analyze_handler(
    State(app_state): State<Arc<AppState>>,
    Path(kind): Path<AnalysisKind>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HandlerError> {
    let mut form = read_form(multipart).await?;

    let settings = app_state.settings.load().await.map_err(|e| {
        error!("Failed to load settings: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let credential = match form.api_key.take().filter(|k| !k.trim().is_empty()) {
        Some(key) => {
            let credential = Credential::new(key.trim());
            Some(if settings.model.is_empty() {
                credential
            } else {
                credential.with_model(settings.model.clone())
            })
        }
        None => settings.credential(),
    };
    let document = form.into_document()?;

    let completed = app_state
        .desk(kind)
        .analyze(
            credential.as_ref(),
            document.as_ref().map(|d| d as &dyn DocumentSource),
        )
        .await
        .map_err(desk_error)?;

    Ok((
        StatusCode::CREATED,
        Json(HistoryItem::from_record(&completed.record)),
    ))
}

/// The analysis currently displayed for this kind.
#[utoipa::path(
    get,
    path = "/{kind}/current",
    params(("kind" = String, Path, description = "`agreement` or `resume`")),
    responses(
        (status = 200, description = "The displayed analysis", body = CurrentAnalysis),
        (status = 204, description = "Nothing is displayed")
    )
)]
pub async fn current_handler(
    State(app_state): State<Arc<AppState>>,
    Path(kind): Path<AnalysisKind>,
) -> Response {
    match app_state.desk(kind).current().await {
        Some(displayed) => Json(CurrentAnalysis::from_displayed(&displayed)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

//=========================================================================================
// History
//=========================================================================================

/// Saved analyses of this kind, newest first.
#[utoipa::path(
    get,
    path = "/{kind}/history",
    params(("kind" = String, Path, description = "`agreement` or `resume`")),
    responses((status = 200, description = "History, newest first", body = [HistoryItem]))
)]
pub async fn list_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(kind): Path<AnalysisKind>,
) -> Json<Vec<HistoryItem>> {
    let history = app_state.desk(kind).load_history().await;
    Json(history.iter().map(HistoryItem::from_record).collect())
}

/// Display a saved analysis without contacting the analysis service.
#[utoipa::path(
    get,
    path = "/{kind}/history/{id}",
    params(
        ("kind" = String, Path, description = "`agreement` or `resume`"),
        ("id" = i64, Path, description = "History record id")
    ),
    responses(
        (status = 200, description = "The saved analysis", body = HistoryItem),
        (status = 404, description = "No such record")
    )
)]
pub async fn view_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path((kind, id)): Path<(AnalysisKind, i64)>,
) -> Result<Json<HistoryItem>, HandlerError> {
    let record = app_state.desk(kind).view(id).await.map_err(desk_error)?;
    Ok(Json(HistoryItem::from_record(&record)))
}

/// Delete one saved analysis. Deleting an unknown id succeeds.
#[utoipa::path(
    delete,
    path = "/{kind}/history/{id}",
    params(
        ("kind" = String, Path, description = "`agreement` or `resume`"),
        ("id" = i64, Path, description = "History record id")
    ),
    responses(
        (status = 204, description = "Deleted"),
        (status = 500, description = "History storage failed")
    )
)]
pub async fn delete_history_item_handler(
    State(app_state): State<Arc<AppState>>,
    Path((kind, id)): Path<(AnalysisKind, i64)>,
) -> Result<StatusCode, HandlerError> {
    app_state.desk(kind).delete(id).await.map_err(desk_error)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete every saved analysis of this kind.
#[utoipa::path(
    delete,
    path = "/{kind}/history",
    params(("kind" = String, Path, description = "`agreement` or `resume`")),
    responses(
        (status = 204, description = "Cleared"),
        (status = 500, description = "History storage failed")
    )
)]
pub async fn clear_history_handler(
    State(app_state): State<Arc<AppState>>,
    Path(kind): Path<AnalysisKind>,
) -> Result<StatusCode, HandlerError> {
    app_state
        .desk(kind)
        .clear_history()
        .await
        .map_err(desk_error)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Settings
//=========================================================================================

#[utoipa::path(
    get,
    path = "/settings",
    responses((status = 200, description = "Saved settings", body = SettingsPayload))
)]
pub async fn get_settings_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<SettingsPayload>, HandlerError> {
    let settings = app_state
        .settings
        .load()
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    Ok(Json(settings.into()))
}

#[utoipa::path(
    put,
    path = "/settings",
    request_body = SettingsPayload,
    responses((status = 200, description = "Settings saved", body = SettingsPayload))
)]
pub async fn put_settings_handler(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<SettingsPayload>,
) -> Result<Json<SettingsPayload>, HandlerError> {
    let settings: Settings = payload.into();
    app_state.settings.save(&settings).await.map_err(|e| {
        error!("Failed to save settings: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(Json(settings.into()))
}

#[utoipa::path(
    delete,
    path = "/settings",
    responses((status = 204, description = "Settings reset to defaults"))
)]
pub async fn delete_settings_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<StatusCode, HandlerError> {
    app_state.settings.clear().await.map_err(|e| {
        error!("Failed to clear settings: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// Models the user can choose from.
#[utoipa::path(
    get,
    path = "/models",
    responses((status = 200, description = "Selectable models", body = [ModelResponse]))
)]
pub async fn list_models_handler() -> Json<Vec<ModelResponse>> {
    Json(AVAILABLE_MODELS.iter().map(ModelResponse::from).collect())
}
