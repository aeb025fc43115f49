//! Document validation outcomes for `getEstDte` / `getEstDteAv`
//!
//! These are business outcomes, not faults: a document the authority never
//! received is a perfectly valid answer to a validation query.

use serde::{Deserialize, Serialize};

/// Which validation service produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationKind {
    /// `QueryEstDte.getEstDte`
    Document,
    /// `QueryEstDteAv.getEstDteAv` (includes the document signature)
    DocumentSignature,
}

/// Interpreted validation state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "code")]
pub enum ValidationOutcome {
    /// `DOK`: received, data matches.
    Accepted,
    /// `DNK` on the signature service: received, signature does not match.
    AcceptedSignatureMismatch,
    /// `DNK` on the plain service: received, amount/data do not match.
    DataMismatch,
    /// `FAU`: not received by the authority.
    NotFound,
    /// `FNA`: document not authorized.
    NotAuthorized,
    /// `FAN`: document voided.
    Voided,
    /// `EMP`: issuer not authorized to issue electronic documents.
    IssuerNotAuthorized,
    /// `TMD`, `TMC`, `MMD`, `MMC`: a debit/credit note modifies it.
    Modified(String),
    /// `AND`, `ANC`: a debit/credit note voids it.
    VoidedByNote(String),
    /// Negative numeric codes: the service could not answer the query.
    ServiceError(String),
    Other(String),
}

impl ValidationOutcome {
    pub fn from_code(code: &str, kind: ValidationKind) -> Self {
        let code = code.trim();
        match code {
            "DOK" => Self::Accepted,
            "DNK" => match kind {
                ValidationKind::Document => Self::DataMismatch,
                ValidationKind::DocumentSignature => Self::AcceptedSignatureMismatch,
            },
            "FAU" => Self::NotFound,
            "FNA" => Self::NotAuthorized,
            "FAN" => Self::Voided,
            "EMP" => Self::IssuerNotAuthorized,
            "TMD" | "TMC" | "MMD" | "MMC" => Self::Modified(code.to_string()),
            "AND" | "ANC" => Self::VoidedByNote(code.to_string()),
            other if other.starts_with('-') && other[1..].parse::<u32>().is_ok() => {
                Self::ServiceError(other.to_string())
            }
            other => Self::Other(other.to_string()),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted | Self::AcceptedSignatureMismatch | Self::Modified(_))
    }
}

/// Typed answer of a validation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationStatus {
    pub kind: ValidationKind,
    /// `ESTADO` verbatim.
    pub code: String,
    pub outcome: ValidationOutcome,
    /// `GLOSA` text, untranslated.
    pub description: Option<String>,
    /// `ERR_CODE` when the authority reports one.
    pub error_code: Option<String>,
    /// `GLOSA_ERR` when the authority reports one.
    pub error_description: Option<String>,
}

/// Typed answer of a status-by-email request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequestStatus {
    pub track_id: u64,
    pub code: String,
    pub accepted: bool,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dnk_depends_on_service() {
        assert_eq!(
            ValidationOutcome::from_code("DNK", ValidationKind::Document),
            ValidationOutcome::DataMismatch
        );
        assert_eq!(
            ValidationOutcome::from_code("DNK", ValidationKind::DocumentSignature),
            ValidationOutcome::AcceptedSignatureMismatch
        );
    }

    #[test]
    fn maps_documented_codes() {
        let kind = ValidationKind::Document;
        assert_eq!(ValidationOutcome::from_code("DOK", kind), ValidationOutcome::Accepted);
        assert_eq!(ValidationOutcome::from_code("FAU", kind), ValidationOutcome::NotFound);
        assert_eq!(ValidationOutcome::from_code("FAN", kind), ValidationOutcome::Voided);
        assert_eq!(
            ValidationOutcome::from_code("MMC", kind),
            ValidationOutcome::Modified("MMC".into())
        );
        assert_eq!(
            ValidationOutcome::from_code("ANC", kind),
            ValidationOutcome::VoidedByNote("ANC".into())
        );
    }

    #[test]
    fn negative_codes_are_service_errors_not_faults() {
        let outcome = ValidationOutcome::from_code("-7", ValidationKind::Document);
        assert_eq!(outcome, ValidationOutcome::ServiceError("-7".into()));
        assert!(!outcome.is_accepted());
        assert_eq!(
            ValidationOutcome::from_code("XYZ", ValidationKind::Document),
            ValidationOutcome::Other("XYZ".into())
        );
    }
}
