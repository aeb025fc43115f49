//! Error types used throughout the SII integration

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Step of the seed → sign → token handshake that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStep {
    /// `CrSeed.getSeed`
    Seed,
    /// Local signature of the seed envelope
    Sign,
    /// `GetTokenFromSeed.getToken`
    Token,
}

crate::impl_domain_status_conversions!(AuthStep {
    Seed => "seed",
    Sign => "sign",
    Token => "token",
});

/// Main error type for SII operations
///
/// Faults only. Business outcomes (validation states, submission states) are
/// returned as values and never surface through this type.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum SiiError {
    /// Unresolvable endpoint, invalid identifier or date, bad configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Seed or token step failed, or returned a non-OK sentinel.
    #[error("Authentication error ({step} step): {message}")]
    Auth { step: AuthStep, message: String },

    /// Every attempt of a remote call failed.
    #[error(
        "Transport error: {operation} ({function}){} failed after {attempts} attempt(s): {}",
        subject_note(subject),
        diagnostics.join("; ")
    )]
    Transport {
        operation: String,
        function: String,
        /// Identifiers of the request (track id, document key).
        #[serde(default)]
        subject: Option<String>,
        attempts: u32,
        diagnostics: Vec<String>,
    },

    /// Upload answered with a non-zero status code.
    #[error("{operation} rejected by SII for {subject} (status {code}): {message}")]
    Submission { operation: String, subject: String, code: i64, message: String },

    /// Response could not be decoded or lacks a mandatory field.
    #[error("Malformed response from {operation}{}: {message}", subject_note(subject))]
    Response {
        operation: String,
        #[serde(default)]
        subject: Option<String>,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SiiError {
    /// Stable label suitable for structured logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Auth { .. } => "auth",
            Self::Transport { .. } => "transport",
            Self::Submission { .. } => "submission",
            Self::Response { .. } => "response",
            Self::Internal(_) => "internal",
        }
    }

    /// Build an authentication error for `step`.
    pub fn auth(step: AuthStep, message: impl Into<String>) -> Self {
        Self::Auth { step, message: message.into() }
    }

    /// Build a response decoding error for `operation`.
    pub fn response(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Response { operation: operation.into(), subject: None, message: message.into() }
    }

    /// Attach the request identifiers to transport and response errors that
    /// carry none yet.
    #[must_use]
    pub fn with_subject(mut self, value: impl Into<String>) -> Self {
        if let Self::Transport { subject, .. } | Self::Response { subject, .. } = &mut self {
            if subject.is_none() {
                *subject = Some(value.into());
            }
        }
        self
    }
}

fn subject_note(subject: &Option<String>) -> String {
    subject.as_deref().map(|s| format!(" for {s}")).unwrap_or_default()
}

/// Result type alias for SII operations
pub type Result<T> = std::result::Result<T, SiiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_lists_every_diagnostic() {
        let err = SiiError::Transport {
            operation: "check_submission_status".into(),
            function: "getEstUp".into(),
            subject: None,
            attempts: 2,
            diagnostics: vec!["attempt 1: timeout".into(), "attempt 2: refused".into()],
        };

        let message = err.to_string();
        assert!(message.contains("getEstUp"));
        assert!(message.contains("2 attempt(s)"));
        assert!(message.contains("attempt 1: timeout; attempt 2: refused"));
        assert_eq!(err.label(), "transport");
    }

    #[test]
    fn auth_error_names_the_step() {
        let err = SiiError::auth(AuthStep::Token, "Token no creado");
        assert_eq!(err.to_string(), "Authentication error (token step): Token no creado");
    }

    #[test]
    fn subject_is_attached_once_and_shown() {
        let err = SiiError::response("getEstDte", "response carries no ESTADO")
            .with_subject("document 33-1502 from 76192083-9")
            .with_subject("ignored");

        assert_eq!(
            err.to_string(),
            "Malformed response from getEstDte for document 33-1502 from 76192083-9: response carries no ESTADO"
        );
    }

    #[test]
    fn subject_leaves_other_errors_untouched() {
        let err = SiiError::Config("bad rut".into()).with_subject("track id 7");
        assert_eq!(err, SiiError::Config("bad rut".into()));
    }

    #[test]
    fn submission_error_names_operation_and_company() {
        let err = SiiError::Submission {
            operation: "DTEUpload".into(),
            subject: "company 76192083-9".into(),
            code: 8,
            message: "Error en firma".into(),
        };
        assert_eq!(
            err.to_string(),
            "DTEUpload rejected by SII for company 76192083-9 (status 8): Error en firma"
        );
    }

    #[test]
    fn errors_serialize_with_type_tag() {
        let err = SiiError::Config("bad rut".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "Config");
    }
}
