//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use siilink_common::cache::CacheError;
use siilink_domain::SiiError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub SiiError);

impl From<InfraError> for SiiError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<SiiError> for InfraError {
    fn from(value: SiiError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoSiiError {
    fn into_sii(self) -> SiiError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → SiiError */
/* -------------------------------------------------------------------------- */

impl IntoSiiError for HttpError {
    fn into_sii(self) -> SiiError {
        if self.is_builder() {
            return SiiError::Config(format!("invalid HTTP client configuration: {self}"));
        }
        SiiError::Internal(format!("http error: {}", describe_http_error(&self)))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_sii())
    }
}

/// One-line description of a reqwest failure including its kind.
pub fn describe_http_error(err: &HttpError) -> String {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect"
    } else if err.is_body() || err.is_decode() {
        "body"
    } else if err.is_request() {
        "request"
    } else {
        "http"
    };

    match err.status() {
        Some(status) => format!("{kind} error (status {status}): {err}"),
        None => format!("{kind} error: {err}"),
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → SiiError */
/* -------------------------------------------------------------------------- */

impl IntoSiiError for std::io::Error {
    fn into_sii(self) -> SiiError {
        SiiError::Internal(format!("i/o error: {self}"))
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_sii())
    }
}

/* -------------------------------------------------------------------------- */
/* quick_xml::Error → SiiError */
/* -------------------------------------------------------------------------- */

impl IntoSiiError for quick_xml::Error {
    fn into_sii(self) -> SiiError {
        SiiError::Internal(format!("xml error: {self}"))
    }
}

impl From<quick_xml::Error> for InfraError {
    fn from(value: quick_xml::Error) -> Self {
        InfraError(value.into_sii())
    }
}

/* -------------------------------------------------------------------------- */
/* config parsing → SiiError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(SiiError::Config(format!("Invalid JSON format: {value}")))
    }
}

impl From<toml::de::Error> for InfraError {
    fn from(value: toml::de::Error) -> Self {
        InfraError(SiiError::Config(format!("Invalid TOML format: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* CacheError → SiiError */
/* -------------------------------------------------------------------------- */

impl IntoSiiError for CacheError {
    fn into_sii(self) -> SiiError {
        SiiError::Internal(format!("token cache error: {self}"))
    }
}

impl From<CacheError> for InfraError {
    fn from(value: CacheError) -> Self {
        InfraError(value.into_sii())
    }
}
