//! Resilient SOAP executor
//!
//! One remote call = build the envelope once, then up to `budget` attempts
//! through the [`HttpTransport`]. Each attempt repairs the body charset,
//! decodes the envelope, rejects SOAP faults and extracts the string the
//! operation returned, which the SII services fill with an escaped XML
//! document. That inner document is decoded and handed back as a tree.

use std::fmt;
use std::sync::Arc;

use quick_xml::escape::escape;
use serde_json::Value;
use siilink_common::resilience::{BlockingRetry, LinearBackoff, RetryError, Sleeper};
use siilink_domain::{Result, SiiError};
use tracing::{debug, warn};

use super::endpoints::{validate_service_name, ResolvedEndpoint};
use crate::codec::{self, MarkupCodec};
use crate::http::{HttpTransport, SoapRequest, TransportOptions};

const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

/// Named string argument of a remote function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapArg {
    pub name: String,
    pub value: String,
}

impl SoapArg {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

/// What a caller may pass as the input of a remote call.
///
/// A bare integer is a retry budget with no arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallInput {
    Args(Vec<SoapArg>),
    RetryBudget(u32),
    ArgsWithRetry(Vec<SoapArg>, u32),
}

impl CallInput {
    /// Split into arguments and an optional budget override.
    pub fn into_parts(self) -> (Vec<SoapArg>, Option<u32>) {
        match self {
            Self::Args(args) => (args, None),
            Self::RetryBudget(budget) => (Vec::new(), Some(budget)),
            Self::ArgsWithRetry(args, budget) => (args, Some(budget)),
        }
    }
}

impl From<u32> for CallInput {
    fn from(budget: u32) -> Self {
        Self::RetryBudget(budget)
    }
}

impl From<Vec<SoapArg>> for CallInput {
    fn from(args: Vec<SoapArg>) -> Self {
        Self::Args(args)
    }
}

impl From<(Vec<SoapArg>, u32)> for CallInput {
    fn from((args, budget): (Vec<SoapArg>, u32)) -> Self {
        Self::ArgsWithRetry(args, budget)
    }
}

/// Decoded answer of a remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    /// Inner document decoded by the markup codec.
    pub tree: Value,
    /// Inner document text after charset repair.
    pub raw: String,
    /// Attempt that succeeded (1-based).
    pub attempts: u32,
}

enum AttemptFailure {
    Retryable(String),
    Fatal(SiiError),
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retryable(message) => f.write_str(message),
            Self::Fatal(err) => write!(f, "{err}"),
        }
    }
}

/// Rewrite invalid UTF-8 sequences to U+FFFD.
pub fn repair_charset(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

/// SOAP 1.1 envelope calling `function` with `args`.
pub fn build_envelope(function: &str, args: &[SoapArg]) -> String {
    let mut body = String::new();
    for arg in args {
        body.push_str(&format!("<{0}>{1}</{0}>", arg.name, escape(arg.value.as_str())));
    }

    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><soapenv:Envelope xmlns:soapenv="{SOAP_ENVELOPE_NS}"><soapenv:Body><{function}>{body}</{function}></soapenv:Body></soapenv:Envelope>"#
    )
}

/// Runs remote calls with bounded retries and linear backoff.
pub struct RpcExecutor {
    transport: Arc<dyn HttpTransport>,
    codec: Arc<dyn MarkupCodec>,
    sleeper: Arc<dyn Sleeper>,
    backoff: LinearBackoff,
}

impl RpcExecutor {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        codec: Arc<dyn MarkupCodec>,
        sleeper: Arc<dyn Sleeper>,
        backoff: LinearBackoff,
    ) -> Self {
        Self { transport, codec, sleeper, backoff }
    }

    /// Call `function` on `endpoint`, making at most `budget` attempts.
    ///
    /// # Errors
    /// - `SiiError::Config` for an invalid function or argument name
    /// - `SiiError::Transport` with one diagnostic per attempt once the
    ///   budget is spent
    /// - `SiiError::Response` when the returned document cannot be decoded
    pub fn call(
        &self,
        endpoint: &ResolvedEndpoint,
        function: &str,
        args: &[SoapArg],
        budget: u32,
        options: &TransportOptions,
    ) -> Result<RemoteResponse> {
        validate_service_name(function)
            .map_err(|_| SiiError::Config(format!("invalid function name '{function}'")))?;
        if let Some(arg) = args.iter().find(|arg| validate_service_name(&arg.name).is_err()) {
            return Err(SiiError::Config(format!("invalid argument name '{}'", arg.name)));
        }

        let request = SoapRequest {
            url: endpoint.url.clone(),
            soap_action: function.to_string(),
            envelope: build_envelope(function, args),
        };
        let retry = BlockingRetry::new(budget, self.backoff, self.sleeper.as_ref());

        let outcome = retry.run(
            |attempt| {
                debug!(service = %endpoint.service, function, attempt, "Calling SII service");
                self.attempt(&request, function, options, attempt).map_err(|failure| {
                    if let AttemptFailure::Retryable(message) = &failure {
                        warn!(
                            service = %endpoint.service,
                            function,
                            attempt,
                            budget = retry.budget(),
                            error = %message,
                            "SII call attempt failed"
                        );
                    }
                    failure
                })
            },
            |failure| matches!(failure, AttemptFailure::Retryable(_)),
        );

        outcome.map_err(|err| match err {
            RetryError::NonRetryable { error: AttemptFailure::Fatal(err), .. } => err,
            RetryError::NonRetryable { error, attempt, .. } => SiiError::Internal(format!(
                "attempt {attempt} of {function} stopped: {error}"
            )),
            RetryError::Exhausted { attempts, failures } => SiiError::Transport {
                operation: endpoint.service.clone(),
                function: function.to_string(),
                subject: None,
                attempts,
                diagnostics: failures
                    .iter()
                    .enumerate()
                    .map(|(i, failure)| format!("attempt {}: {failure}", i + 1))
                    .collect(),
            },
        })
    }

    fn attempt(
        &self,
        request: &SoapRequest,
        function: &str,
        options: &TransportOptions,
        attempt: u32,
    ) -> std::result::Result<RemoteResponse, AttemptFailure> {
        let reply = self
            .transport
            .post_soap(request, options)
            .map_err(|fault| AttemptFailure::Retryable(format!("transport: {fault}")))?;

        let body = repair_charset(&reply.body);
        if body.trim().is_empty() {
            return Err(AttemptFailure::Retryable(format!(
                "empty response (HTTP {})",
                reply.status
            )));
        }

        let envelope = self.codec.decode(&body).map_err(|e| {
            AttemptFailure::Retryable(format!("undecodable response (HTTP {}): {e}", reply.status))
        })?;

        if let Some(fault) = codec::find_element(&envelope, "Fault") {
            let code = codec::text_at(fault, &["faultcode"]).unwrap_or_default();
            let message = codec::text_at(fault, &["faultstring"]).unwrap_or_default();
            return Err(AttemptFailure::Retryable(format!("SOAP fault {code}: {message}")));
        }
        if !reply.is_success() {
            return Err(AttemptFailure::Retryable(format!("HTTP {}", reply.status)));
        }

        let payload = return_value(&envelope, function).ok_or_else(|| {
            AttemptFailure::Retryable(format!("response carries no {function} return value"))
        })?;

        let tree = self.codec.decode(&payload).map_err(|e| {
            AttemptFailure::Fatal(SiiError::response(function, format!("undecodable payload: {e}")))
        })?;

        Ok(RemoteResponse { tree, raw: payload, attempts: attempt })
    }
}

/// Text of the first child of `<{function}Response>` inside the SOAP body.
fn return_value(envelope: &Value, function: &str) -> Option<String> {
    let body = codec::find_element(envelope, "Body")?;
    let response = codec::find_element(body, &format!("{function}Response"))?;
    let Value::Object(children) = response else {
        return None;
    };

    children
        .iter()
        .find(|(key, _)| !key.starts_with('@') && !key.starts_with('#'))
        .and_then(|(_, value)| codec::text(value))
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
