//! Submission (track id) state taxonomy for `QueryEstUp.getEstUp`

use serde::{Deserialize, Serialize};

use super::upload::StatusEntry;

/// Processing state of an uploaded envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SubmissionState {
    /// `SOK`: schema validated
    SchemaValidated,
    /// `CRT`: cover (carátula) validated
    CoverValidated,
    /// `FOK`: envelope signature validated
    SignatureValidated,
    /// `PDR`: still being processed
    Processing,
    /// `EPR`: processed; see document counters
    Processed,
    /// `RPR`: accepted with objections
    AcceptedWithObjections,
    /// `RLV`: accepted with minor objections
    AcceptedWithMinorObjections,
    /// `RSC`: rejected by schema
    RejectedSchema,
    /// `RFR`: rejected by signature
    RejectedSignature,
    /// `RCT`: rejected by cover
    RejectedCover,
    /// `RCH`: rejected
    Rejected,
    /// `RCO`: rejected by inconsistency
    RejectedInconsistency,
    /// `-11`: transient service error, query again later
    RetryLater,
    /// Any other (possibly negative numeric) code, verbatim.
    Other(String),
}

impl SubmissionState {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "SOK" => Self::SchemaValidated,
            "CRT" => Self::CoverValidated,
            "FOK" => Self::SignatureValidated,
            "PDR" => Self::Processing,
            "EPR" => Self::Processed,
            "RPR" => Self::AcceptedWithObjections,
            "RLV" => Self::AcceptedWithMinorObjections,
            "RSC" => Self::RejectedSchema,
            "RFR" => Self::RejectedSignature,
            "RCT" => Self::RejectedCover,
            "RCH" => Self::Rejected,
            "RCO" => Self::RejectedInconsistency,
            "-11" => Self::RetryLater,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::SchemaValidated => "SOK",
            Self::CoverValidated => "CRT",
            Self::SignatureValidated => "FOK",
            Self::Processing => "PDR",
            Self::Processed => "EPR",
            Self::AcceptedWithObjections => "RPR",
            Self::AcceptedWithMinorObjections => "RLV",
            Self::RejectedSchema => "RSC",
            Self::RejectedSignature => "RFR",
            Self::RejectedCover => "RCT",
            Self::Rejected => "RCH",
            Self::RejectedInconsistency => "RCO",
            Self::RetryLater => "-11",
            Self::Other(code) => code,
        }
    }

    pub fn meaning(&self) -> &'static str {
        match self {
            Self::SchemaValidated => "Schema validado",
            Self::CoverValidated => "Carátula OK",
            Self::SignatureValidated => "Firma de envío validada",
            Self::Processing => "Envío en proceso",
            Self::Processed => "Envío procesado",
            Self::AcceptedWithObjections => "Aceptado con reparos",
            Self::AcceptedWithMinorObjections => "Aceptado con reparos leves",
            Self::RejectedSchema => "Rechazado por error en schema",
            Self::RejectedSignature => "Rechazado por error en firma",
            Self::RejectedCover => "Rechazado por error en carátula",
            Self::Rejected => "Rechazado",
            Self::RejectedInconsistency => "Rechazado por inconsistencia",
            Self::RetryLater => "Error transitorio del servicio, reintentar",
            Self::Other(_) => "Estado no documentado",
        }
    }

    /// Whether polling the track id should stop.
    ///
    /// Undocumented codes are terminal.
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            Self::SchemaValidated
                | Self::CoverValidated
                | Self::SignatureValidated
                | Self::Processing
                | Self::RetryLater
        )
    }

    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::RejectedSchema
                | Self::RejectedSignature
                | Self::RejectedCover
                | Self::Rejected
                | Self::RejectedInconsistency
        )
    }

    /// Numeric taxonomy entry, available for numeric service codes only.
    pub fn entry(&self) -> Option<StatusEntry> {
        let code = self.code().parse::<i64>().ok()?;
        Some(StatusEntry { code, meaning: self.meaning(), terminal: self.is_terminal() })
    }
}

impl From<String> for SubmissionState {
    fn from(code: String) -> Self {
        Self::from_code(&code)
    }
}

impl From<SubmissionState> for String {
    fn from(state: SubmissionState) -> Self {
        state.code().to_string()
    }
}

/// Document counters reported for a processed envelope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCounters {
    pub informed: u32,
    pub accepted: u32,
    pub rejected: u32,
    pub objections: u32,
}

/// Typed answer of a submission status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionStatus {
    pub track_id: u64,
    pub state: SubmissionState,
    /// `GLOSA` text, untranslated.
    pub description: Option<String>,
    pub counters: Option<SubmissionCounters>,
}
