//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use document_analyzer_core::domain::AnalysisKind;
use document_analyzer_core::ports::SettingsService;
use document_analyzer_core::AnalysisDesk;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub agreement_desk: Arc<AnalysisDesk>,
    pub resume_desk: Arc<AnalysisDesk>,
    pub settings: Arc<dyn SettingsService>,
}

impl AppState {
    /// The desk serving documents of `kind`.
    pub fn desk(&self, kind: AnalysisKind) -> &AnalysisDesk {
        match kind {
            AnalysisKind::Agreement => &self.agreement_desk,
            AnalysisKind::Resume => &self.resume_desk,
        }
    }
}
