//! Upload status taxonomy
//!
//! `DTEUpload` answers with a numeric `STATUS`. Zero is the only success;
//! every other code maps to a fixed meaning and a terminal flag telling the
//! caller whether resubmitting could ever change the outcome.

use serde::{Deserialize, Serialize};

/// Fixed meaning of a numeric status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusEntry {
    pub code: i64,
    pub meaning: &'static str,
    /// `true` when repeating the operation cannot change the outcome.
    pub terminal: bool,
}

/// Status returned by the document upload endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum UploadStatus {
    Accepted,
    PermissionDenied,
    SizeError,
    Truncated,
    NotAuthenticated,
    CompanyNotAuthorized,
    InvalidSchema,
    InvalidSignature,
    InternalError,
    Duplicate,
    Unknown(i64),
}

impl UploadStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => Self::Accepted,
            1 => Self::PermissionDenied,
            2 => Self::SizeError,
            3 => Self::Truncated,
            5 => Self::NotAuthenticated,
            6 => Self::CompanyNotAuthorized,
            7 => Self::InvalidSchema,
            8 => Self::InvalidSignature,
            9 => Self::InternalError,
            99 => Self::Duplicate,
            other => Self::Unknown(other),
        }
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Accepted => 0,
            Self::PermissionDenied => 1,
            Self::SizeError => 2,
            Self::Truncated => 3,
            Self::NotAuthenticated => 5,
            Self::CompanyNotAuthorized => 6,
            Self::InvalidSchema => 7,
            Self::InvalidSignature => 8,
            Self::InternalError => 9,
            Self::Duplicate => 99,
            Self::Unknown(code) => code,
        }
    }

    /// Human-readable meaning, in the authority's language.
    pub fn meaning(self) -> String {
        match self.fixed_meaning() {
            Some(meaning) => meaning.to_string(),
            None => format!("Código de estado desconocido ({})", self.code()),
        }
    }

    fn fixed_meaning(self) -> Option<&'static str> {
        let meaning = match self {
            Self::Accepted => "Envío recibido correctamente",
            Self::PermissionDenied => "El usuario que envía no tiene permiso para enviar",
            Self::SizeError => "Error en el tamaño del archivo (muy grande o muy chico)",
            Self::Truncated => "Archivo cortado (tamaño distinto al informado)",
            Self::NotAuthenticated => "No está autenticado (token inválido o expirado)",
            Self::CompanyNotAuthorized => "Empresa no autorizada a enviar archivos",
            Self::InvalidSchema => "Esquema del documento inválido",
            Self::InvalidSignature => "Error en la firma del documento",
            Self::InternalError => "Error interno del sistema del SII",
            Self::Duplicate => "El envío ya fue recibido anteriormente",
            Self::Unknown(_) => return None,
        };
        Some(meaning)
    }

    /// A stale token (`5`) and an upstream failure (`9`) may succeed on a
    /// later attempt; every other code is final for this payload.
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::NotAuthenticated | Self::InternalError)
    }

    pub fn is_success(self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Taxonomy entry for known codes. Unknown codes have no fixed entry.
    pub fn entry(self) -> Option<StatusEntry> {
        self.fixed_meaning().map(|meaning| StatusEntry {
            code: self.code(),
            meaning,
            terminal: self.is_terminal(),
        })
    }
}

impl From<i64> for UploadStatus {
    fn from(code: i64) -> Self {
        Self::from_code(code)
    }
}

impl From<UploadStatus> for i64 {
    fn from(status: UploadStatus) -> Self {
        status.code()
    }
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    pub track_id: u64,
    pub status: UploadStatus,
    pub message: String,
    /// Timestamp reported by the authority, verbatim.
    pub timestamp: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn documented_codes_have_distinct_meanings() {
        let codes = [0, 1, 2, 3, 5, 6, 7, 8, 9, 99, 42];
        let meanings: HashSet<String> =
            codes.iter().map(|code| UploadStatus::from_code(*code).meaning()).collect();

        assert_eq!(meanings.len(), codes.len());
        assert!(meanings.iter().all(|meaning| !meaning.is_empty()));
    }

    #[test]
    fn unknown_code_passes_through_verbatim() {
        let status = UploadStatus::from_code(42);
        assert_eq!(status, UploadStatus::Unknown(42));
        assert_eq!(status.code(), 42);
        assert!(status.meaning().contains("42"));
        assert!(status.entry().is_none());
    }

    #[test]
    fn signature_failure_mentions_firma() {
        assert!(UploadStatus::from_code(8).meaning().contains("firma"));
    }

    #[test]
    fn stale_token_and_internal_error_are_not_terminal() {
        assert!(!UploadStatus::NotAuthenticated.is_terminal());
        assert!(!UploadStatus::InternalError.is_terminal());
        assert!(UploadStatus::Duplicate.is_terminal());
        assert!(UploadStatus::InvalidSchema.is_terminal());
    }

    #[test]
    fn entry_carries_code_and_flag() {
        let entry = UploadStatus::from_code(99).entry().unwrap();
        assert_eq!(entry.code, 99);
        assert!(entry.terminal);
    }

    #[test]
    fn serializes_as_numeric_code() {
        assert_eq!(serde_json::to_string(&UploadStatus::InvalidSchema).unwrap(), "7");
        let parsed: UploadStatus = serde_json::from_str("123").unwrap();
        assert_eq!(parsed, UploadStatus::Unknown(123));
    }
}
