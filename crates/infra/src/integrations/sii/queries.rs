//! Status and validation queries
//!
//! Each query validates its input locally, builds the fixed argument list of
//! the remote function and maps the answer to a typed status. Inputs that
//! fail validation never reach the network.

use chrono::NaiveDate;
use serde_json::Value;
use siilink_domain::constants::{
    FUNCTION_DOCUMENT_SIGNATURE_STATUS, FUNCTION_DOCUMENT_STATUS, FUNCTION_STATUS_EMAIL,
    FUNCTION_SUBMISSION_STATUS,
};
use siilink_domain::{
    EmailRequestStatus, Result, Rut, SiiError, SubmissionCounters, SubmissionState,
    SubmissionStatus, ValidationKind, ValidationOutcome, ValidationStatus,
};

use super::rpc::{RemoteResponse, SoapArg};
use crate::codec;

/// Typed answer plus what was asked and what came back.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse<T> {
    pub result: T,
    pub arguments: Vec<SoapArg>,
    pub raw: String,
}

/// Identifies an issued document for `getEstDte` / `getEstDteAv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentQuery {
    pub issuer: Rut,
    pub receiver: Rut,
    pub document_type: u16,
    pub folio: u64,
    /// `YYYY-MM-DD`
    pub issue_date: String,
    pub amount: u64,
    /// Person asking. Defaults to the credential holder.
    pub requester: Option<Rut>,
}

/// Identifiers of a submission, for error reports.
pub fn track_subject(company: &Rut, track_id: u64) -> String {
    format!("track id {track_id} of company {company}")
}

/// Identifiers of a document, for error reports.
pub fn document_subject(query: &DocumentQuery) -> String {
    format!("document {}-{} from {}", query.document_type, query.folio, query.issuer)
}

/// Document plus the `SignatureValue` of its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDocumentQuery {
    pub document: DocumentQuery,
    pub signature: String,
}

/// Date of issue in `DDMMYYYY`, or `DD-MM-YYYY` with `dashed`.
pub fn format_issue_date(date: &str, dashed: bool) -> Result<String> {
    let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
        .map_err(|_| SiiError::Config(format!("invalid issue date '{date}', expected YYYY-MM-DD")))?;
    Ok(parsed.format(if dashed { "%d-%m-%Y" } else { "%d%m%Y" }).to_string())
}

fn require_positive(name: &str, value: u64) -> Result<()> {
    if value == 0 {
        return Err(SiiError::Config(format!("{name} must be positive")));
    }
    Ok(())
}

fn rut_args(rut_name: &str, dv_name: &str, rut: &Rut) -> [SoapArg; 2] {
    let (body, dv) = rut.split();
    [SoapArg::new(rut_name, body), SoapArg::new(dv_name, dv)]
}

impl DocumentQuery {
    fn validate(&self) -> Result<()> {
        require_positive("document type", u64::from(self.document_type))?;
        require_positive("folio", self.folio)?;
        require_positive("amount", self.amount)?;
        format_issue_date(&self.issue_date, false).map(|_| ())
    }
}

/// Arguments of `getEstUp`.
pub fn submission_status_args(company: &Rut, track_id: u64, token: &str) -> Result<Vec<SoapArg>> {
    require_positive("track id", track_id)?;

    let mut args = rut_args("RutCompania", "DvCompania", company).to_vec();
    args.push(SoapArg::new("TrackId", track_id.to_string()));
    args.push(SoapArg::new("Token", token));
    Ok(args)
}

/// Arguments of `getEstDte`.
pub fn document_status_args(
    query: &DocumentQuery,
    requester: &Rut,
    token: &str,
) -> Result<Vec<SoapArg>> {
    query.validate()?;

    let mut args = Vec::with_capacity(11);
    args.extend(rut_args("RutConsultante", "DvConsultante", requester));
    args.extend(rut_args("RutCompania", "DvCompania", &query.issuer));
    args.extend(rut_args("RutReceptor", "DvReceptor", &query.receiver));
    args.push(SoapArg::new("TipoDte", query.document_type.to_string()));
    args.push(SoapArg::new("FolioDte", query.folio.to_string()));
    args.push(SoapArg::new("FechaEmisionDte", format_issue_date(&query.issue_date, false)?));
    args.push(SoapArg::new("MontoDte", query.amount.to_string()));
    args.push(SoapArg::new("Token", token));
    Ok(args)
}

/// Arguments of `getEstDteAv`.
pub fn document_signature_status_args(
    query: &SignedDocumentQuery,
    token: &str,
) -> Result<Vec<SoapArg>> {
    let document = &query.document;
    document.validate()?;
    if query.signature.trim().is_empty() {
        return Err(SiiError::Config("document signature is empty".into()));
    }

    let mut args = Vec::with_capacity(10);
    args.extend(rut_args("RutEmpresa", "DvEmpresa", &document.issuer));
    args.extend(rut_args("RutReceptor", "DvReceptor", &document.receiver));
    args.push(SoapArg::new("TipoDte", document.document_type.to_string()));
    args.push(SoapArg::new("FolioDte", document.folio.to_string()));
    args.push(SoapArg::new("FechaEmisionDte", format_issue_date(&document.issue_date, true)?));
    args.push(SoapArg::new("MontoDte", document.amount.to_string()));
    args.push(SoapArg::new("FirmaDte", query.signature.trim()));
    args.push(SoapArg::new("Token", token));
    Ok(args)
}

/// Arguments of `reenvioCorreo`.
pub fn status_email_args(company: &Rut, track_id: u64, token: &str) -> Result<Vec<SoapArg>> {
    require_positive("track id", track_id)?;

    let mut args = vec![SoapArg::new("Token", token)];
    args.extend(rut_args("RutEmpresa", "DvEmpresa", company));
    args.push(SoapArg::new("TrackId", track_id.to_string()));
    Ok(args)
}

/// Fill the `Token` argument once a session token is available.
pub fn attach_token(args: &mut [SoapArg], token: &str) {
    if let Some(arg) = args.iter_mut().find(|arg| arg.name == "Token") {
        arg.value = token.to_string();
    }
}

fn header_text(tree: &Value, field: &str) -> Option<String> {
    codec::text_at(tree, &["RESPUESTA", "RESP_HDR", field])
}

fn required_state(tree: &Value, function: &str) -> Result<String> {
    header_text(tree, "ESTADO")
        .ok_or_else(|| SiiError::response(function, "response carries no ESTADO"))
}

fn counter(tree: &Value, field: &str) -> Option<u32> {
    codec::text_at(tree, &["RESPUESTA", "RESP_BODY", field]).and_then(|raw| raw.parse().ok())
}

/// Map a `getEstUp` answer.
pub fn parse_submission_status(response: &RemoteResponse, track_id: u64) -> Result<SubmissionStatus> {
    let tree = &response.tree;
    let state = SubmissionState::from_code(&required_state(tree, FUNCTION_SUBMISSION_STATUS)?);

    let counters = counter(tree, "INFORMADOS").map(|informed| SubmissionCounters {
        informed,
        accepted: counter(tree, "ACEPTADOS").unwrap_or_default(),
        rejected: counter(tree, "RECHAZADOS").unwrap_or_default(),
        objections: counter(tree, "REPAROS").unwrap_or_default(),
    });

    Ok(SubmissionStatus {
        track_id,
        state,
        description: header_text(tree, "GLOSA"),
        counters,
    })
}

/// Map a `getEstDte` or `getEstDteAv` answer.
pub fn parse_validation_status(
    response: &RemoteResponse,
    kind: ValidationKind,
) -> Result<ValidationStatus> {
    let tree = &response.tree;
    let function = match kind {
        ValidationKind::Document => FUNCTION_DOCUMENT_STATUS,
        ValidationKind::DocumentSignature => FUNCTION_DOCUMENT_SIGNATURE_STATUS,
    };
    let code = required_state(tree, function)?;

    Ok(ValidationStatus {
        kind,
        outcome: ValidationOutcome::from_code(&code, kind),
        code,
        description: header_text(tree, "GLOSA_ESTADO").or_else(|| header_text(tree, "GLOSA")),
        error_code: header_text(tree, "ERR_CODE"),
        error_description: header_text(tree, "GLOSA_ERR"),
    })
}

/// Map a `reenvioCorreo` answer. `ESTADO` `0` means the request was taken.
pub fn parse_email_status(response: &RemoteResponse, track_id: u64) -> Result<EmailRequestStatus> {
    let tree = &response.tree;
    let code = required_state(tree, FUNCTION_STATUS_EMAIL)?;

    Ok(EmailRequestStatus {
        track_id,
        accepted: code == "0",
        code,
        description: header_text(tree, "GLOSA"),
    })
}
