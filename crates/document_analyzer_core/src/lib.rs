pub mod client;
pub mod desk;
pub mod domain;
pub mod encoder;
pub mod health;
pub mod ports;

pub use client::{AnalysisClient, AnalysisError};
pub use desk::{AnalysisDesk, CompletedAnalysis, DeskError, DisplayedAnalysis};
pub use domain::{
    AgreementReport, AnalysisKind, AnalysisRecord, AnalysisReport, Credential, ResumeReport,
    ServiceAvailability, Settings,
};
pub use encoder::{encode, EncodeError, EncodedPayload};
pub use health::{HealthMonitor, PollingHandle};
pub use ports::{
    DocumentSource, FileDocument, HistoryStore, HttpTransport, InMemoryDocument, SettingsError,
    SettingsService, StoreError, StoreResult, TransportError, TransportResponse,
};
