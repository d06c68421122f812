//! crates/document_analyzer_core/src/domain.rs
//!
//! Defines the core data structures for the document analyzer client.
//! Reports are kept as the JSON object the remote analysis service returned; the
//! typed report structs are read-only views over that object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

//=========================================================================================
// Analysis Kind
//=========================================================================================

/// Discriminates the two document pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// An employment agreement, scanned for scam indicators and risky clauses.
    Agreement,
    /// A resume, scored section by section.
    Resume,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 2] = [AnalysisKind::Agreement, AnalysisKind::Resume];

    /// The remote endpoint that analyzes documents of this kind.
    pub fn endpoint_path(self) -> &'static str {
        match self {
            AnalysisKind::Agreement => "/api/analyze",
            AnalysisKind::Resume => "/api/resume/analyze",
        }
    }

    /// Name of the durable collection holding this kind's history.
    pub fn collection(self) -> &'static str {
        match self {
            AnalysisKind::Agreement => "agreements",
            AnalysisKind::Resume => "resumes",
        }
    }

    /// Filename sent when the caller supplies an empty one.
    pub fn fallback_filename(self) -> &'static str {
        match self {
            AnalysisKind::Agreement => "document.txt",
            AnalysisKind::Resume => "resume.txt",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisKind::Agreement => "agreement",
            AnalysisKind::Resume => "resume",
        }
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Agreement Report
//=========================================================================================

// The report views below accept what the service's model actually emits: `null`
// where a list is expected, and labels outside the documented set.

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Generates a label enum that keeps unrecognised values instead of rejecting them.
macro_rules! open_label {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// A label the service sent that is not in the documented set.
            Other(String),
        }

        impl From<String> for $name {
            fn from(label: String) -> Self {
                match label.to_ascii_uppercase().as_str() {
                    $($text => $name::$variant,)+
                    _ => $name::Other(label),
                }
            }
        }

        impl From<$name> for String {
            fn from(label: $name) -> Self {
                match label {
                    $($name::$variant => $text.to_string(),)+
                    $name::Other(label) => label,
                }
            }
        }
    };
}

open_label!(RiskLevel {
    Low => "LOW",
    Medium => "MEDIUM",
    High => "HIGH",
    Critical => "CRITICAL",
});

/// A single flagged passage of an agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub category: String,
    pub severity: RiskLevel,
    pub description: String,
    #[serde(default)]
    pub quote: String,
}

/// The result of analyzing an employment agreement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementReport {
    /// 0 to 100, higher is riskier.
    pub risk_score: u32,
    pub risk_level: RiskLevel,
    pub summary: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub scam_indicators: Vec<Finding>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub risky_clauses: Vec<Finding>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub missing_elements: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub recommendations: Vec<String>,
}

//=========================================================================================
// Resume Report
//=========================================================================================

open_label!(SectionStatus {
    Excellent => "EXCELLENT",
    Good => "GOOD",
    NeedsImprovement => "NEEDS_IMPROVEMENT",
    Poor => "POOR",
});

open_label!(Priority {
    High => "HIGH",
    Medium => "MEDIUM",
    Low => "LOW",
});

/// One scored aspect of a resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreSection {
    pub score: u32,
    pub status: SectionStatus,
    pub feedback: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub issues: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeSuggestion {
    pub priority: Priority,
    pub category: String,
    pub current: String,
    pub suggested: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub item: String,
    pub status: bool,
    #[serde(default)]
    pub note: String,
}

/// The result of analyzing a resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeReport {
    pub overall_score: u32,
    pub score_category: String,
    pub summary: String,
    pub action_verb_score: ScoreSection,
    pub quantification_score: ScoreSection,
    pub spelling_grammar: ScoreSection,
    pub section_structure: ScoreSection,
    pub word_variety: ScoreSection,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub suggestions: Vec<ResumeSuggestion>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub checklist: Vec<ChecklistItem>,
}

//=========================================================================================
// Kind-tagged Report and History Record
//=========================================================================================

/// A completed analysis of either kind, held exactly as the remote service sent it.
///
/// Business fields are never checked here. The typed views ([`AnalysisReport::agreement`],
/// [`AnalysisReport::resume`]) are read on demand and may be `None` for bodies that
/// stray from the documented schema; the body itself is always kept.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisReport {
    kind: AnalysisKind,
    body: serde_json::Value,
}

impl AnalysisReport {
    /// Accepts any JSON object as a report of `kind`.
    pub fn from_json(kind: AnalysisKind, body: &[u8]) -> Result<Self, serde_json::Error> {
        Self::from_value(kind, serde_json::from_slice(body)?)
    }

    pub fn from_value(
        kind: AnalysisKind,
        body: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        if !body.is_object() {
            return Err(serde::de::Error::custom("expected a JSON object"));
        }
        Ok(Self { kind, body })
    }

    pub fn from_agreement(report: &AgreementReport) -> Result<Self, serde_json::Error> {
        Self::from_value(AnalysisKind::Agreement, serde_json::to_value(report)?)
    }

    pub fn from_resume(report: &ResumeReport) -> Result<Self, serde_json::Error> {
        Self::from_value(AnalysisKind::Resume, serde_json::to_value(report)?)
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    /// The body as received.
    pub fn body(&self) -> &serde_json::Value {
        &self.body
    }

    pub fn agreement(&self) -> Option<AgreementReport> {
        match self.kind {
            AnalysisKind::Agreement => AgreementReport::deserialize(&self.body).ok(),
            AnalysisKind::Resume => None,
        }
    }

    pub fn resume(&self) -> Option<ResumeReport> {
        match self.kind {
            AnalysisKind::Resume => ResumeReport::deserialize(&self.body).ok(),
            AnalysisKind::Agreement => None,
        }
    }
}

impl Serialize for AnalysisReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.body.serialize(serializer)
    }
}

/// A durably stored snapshot of one completed analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub kind: AnalysisKind,
    pub filename: String,
    pub analyzed_at: DateTime<Utc>,
    pub result: AnalysisReport,
}

//=========================================================================================
// Availability, Credentials and Settings
//=========================================================================================

/// Whether the remote service can currently accept requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceAvailability {
    Checking,
    Online,
    Offline,
}

/// The caller-supplied credential forwarded to the remote service untouched.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub api_key: String,
    pub model: Option<String>,
}

impl Credential {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

// Keeps the key out of logs.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";

/// A model the user may pick in settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelOption {
    pub id: &'static str,
    pub name: &'static str,
}

pub const AVAILABLE_MODELS: [ModelOption; 2] = [
    ModelOption {
        id: "gemini-2.5-pro",
        name: "Gemini 2.5 Pro (Latest)",
    },
    ModelOption {
        id: "gemini-1.5-pro",
        name: "Gemini 1.5 Pro",
    },
];

/// User settings owned by the settings collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub api_key: String,
    pub model: String,
    pub use_own_key: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            use_own_key: false,
        }
    }
}

impl Settings {
    /// The credential to forward, if the user opted in and entered a key.
    pub fn credential(&self) -> Option<Credential> {
        if !self.use_own_key || self.api_key.trim().is_empty() {
            return None;
        }
        let credential = Credential::new(self.api_key.trim());
        Some(if self.model.is_empty() {
            credential
        } else {
            credential.with_model(self.model.clone())
        })
    }
}
