//! Multipart document upload

use std::io::Write;
use std::sync::Arc;

use encoding_rs::Encoding;
use flate2::write::GzEncoder;
use flate2::Compression;
use siilink_common::resilience::{BlockingRetry, LinearBackoff, RetryError, Sleeper};
use siilink_domain::constants::{
    DOCUMENT_XML_DECLARATION, UPLOAD_INTERNAL_ERROR_BODY, UPLOAD_USER_AGENT,
};
use siilink_domain::{Result, Rut, SiiError, UploadReceipt, UploadStatus};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::codec::{self, MarkupCodec};
use crate::errors::InfraError;
use crate::http::{HttpTransport, MultipartRequest, TransportOptions};
use crate::observability::fingerprint;

const UPLOAD_OPERATION: &str = "DTEUpload";
const UPLOAD_FUNCTION: &str = "upload";

/// A signed document envelope ready to be sent.
#[derive(Debug, Clone)]
pub struct DocumentUpload {
    pub payload: String,
    /// Company the document belongs to.
    pub company: Rut,
    /// Person sending it. Defaults to the credential holder.
    pub sender: Option<Rut>,
    pub compress: bool,
}

impl DocumentUpload {
    pub fn new(payload: impl Into<String>, company: Rut) -> Self {
        Self { payload: payload.into(), company, sender: None, compress: false }
    }

    pub fn with_sender(mut self, sender: Rut) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn compressed(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

/// Payload bytes in the encoding named by its XML declaration.
///
/// Payloads without a declaration get [`DOCUMENT_XML_DECLARATION`] and are
/// therefore encoded as ISO-8859-1. Empty documents are rejected, as are
/// characters the declared encoding cannot represent.
pub fn prepare_payload(payload: &str) -> Result<Vec<u8>> {
    let trimmed = payload.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Err(SiiError::Config("document payload is empty".into()));
    }

    let document = match trimmed.strip_prefix("<?xml") {
        Some(rest) => {
            let body = rest.split_once("?>").map(|(_, body)| body.trim()).unwrap_or_default();
            if body.is_empty() {
                return Err(SiiError::Config(
                    "document payload holds only an XML declaration".into(),
                ));
            }
            trimmed.to_string()
        }
        None => format!("{DOCUMENT_XML_DECLARATION}\n{trimmed}"),
    };

    // XML without an encoding attribute is UTF-8.
    let label = declared_encoding(&document).unwrap_or("UTF-8");
    encode_document(&document, label)
}

/// Value of the `encoding` attribute of the XML declaration, if any.
fn declared_encoding(document: &str) -> Option<&str> {
    let declaration = document.strip_prefix("<?xml")?.split_once("?>")?.0;
    let (_, after) = declaration.split_once("encoding")?;
    let value = after.trim_start().strip_prefix('=')?.trim_start();
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    value[1..].split(quote).next()
}

fn encode_document(document: &str, label: &str) -> Result<Vec<u8>> {
    let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
        SiiError::Config(format!("unsupported document encoding '{label}'"))
    })?;
    let (bytes, used, had_errors) = encoding.encode(document);
    if used != encoding {
        return Err(SiiError::Config(format!("cannot write documents as '{label}'")));
    }
    if had_errors {
        return Err(SiiError::Config(format!(
            "document holds characters not representable in '{label}'"
        )));
    }
    Ok(bytes.into_owned())
}

/// Gzip `bytes`; `None` if the encoder fails.
pub fn gzip(bytes: &[u8]) -> Option<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    if encoder.write_all(bytes).is_err() {
        return None;
    }
    encoder.finish().ok()
}

/// Sends documents to the upload endpoint.
pub struct DocumentSubmitter {
    transport: Arc<dyn HttpTransport>,
    codec: Arc<dyn MarkupCodec>,
    sleeper: Arc<dyn Sleeper>,
    backoff: LinearBackoff,
}

impl DocumentSubmitter {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        codec: Arc<dyn MarkupCodec>,
        sleeper: Arc<dyn Sleeper>,
        backoff: LinearBackoff,
    ) -> Self {
        Self { transport, codec, sleeper, backoff }
    }

    /// Upload `document` to `url` with `token`.
    ///
    /// # Errors
    /// - `SiiError::Config` for an empty payload
    /// - `SiiError::Transport` when every attempt failed
    /// - `SiiError::Submission` when SII answers a non-zero status
    /// - `SiiError::Response` for an unparsable answer
    pub fn submit(
        &self,
        url: &str,
        token: &str,
        sender: &Rut,
        document: &DocumentUpload,
        budget: u32,
        options: &TransportOptions,
    ) -> Result<UploadReceipt> {
        let payload = prepare_payload(&document.payload)?;
        let (bytes, compressed) = if document.compress {
            match gzip(&payload) {
                Some(bytes) => (bytes, true),
                None => {
                    debug!("Compression failed, sending uncompressed payload");
                    (payload, false)
                }
            }
        } else {
            (payload, false)
        };

        // Removed when dropped, on every exit path.
        let file = write_temp_file(&bytes, compressed)?;
        let file_name = file
            .path()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "envio.xml".to_string());

        let (sender_body, sender_dv) = sender.split();
        let (company_body, company_dv) = document.company.split();
        let request = MultipartRequest {
            url: url.to_string(),
            fields: vec![
                ("rutSender".into(), sender_body),
                ("dvSender".into(), sender_dv),
                ("rutCompany".into(), company_body),
                ("dvCompany".into(), company_dv),
            ],
            file_field: "archivo".into(),
            file_path: file.path().to_path_buf(),
            file_name,
            file_content_type: if compressed { "application/gzip" } else { "text/xml" }.into(),
            cookie: Some(format!("TOKEN={token}")),
            user_agent: Some(UPLOAD_USER_AGENT.into()),
        };

        debug!(
            company = %document.company,
            bytes = bytes.len(),
            compressed,
            token = %fingerprint(token),
            "Uploading document to SII"
        );

        let subject = format!("company {}", document.company);
        let retry = BlockingRetry::new(budget, self.backoff, self.sleeper.as_ref());
        let body = retry
            .run(
                |attempt| {
                    self.attempt(&request, options).inspect_err(|message| {
                        warn!(attempt, budget = retry.budget(), error = %message, "Upload attempt failed");
                    })
                },
                |_| true,
            )
            .map_err(|err| transport_error(err, &subject))?;

        let receipt = self.parse_receipt(&body, &subject)?;
        info!(track_id = receipt.track_id, company = %document.company, "Document accepted for processing");
        Ok(receipt)
    }

    fn attempt(
        &self,
        request: &MultipartRequest,
        options: &TransportOptions,
    ) -> std::result::Result<String, String> {
        let reply = self
            .transport
            .post_multipart(request, options)
            .map_err(|fault| format!("transport: {fault}"))?;

        let body = String::from_utf8_lossy(&reply.body).trim().to_string();
        if body.is_empty() {
            return Err(format!("empty response (HTTP {})", reply.status));
        }
        if body == UPLOAD_INTERNAL_ERROR_BODY {
            return Err(format!("SII answered '{UPLOAD_INTERNAL_ERROR_BODY}'"));
        }
        Ok(body)
    }

    fn parse_receipt(&self, body: &str, subject: &str) -> Result<UploadReceipt> {
        let malformed =
            |message: String| SiiError::response(UPLOAD_OPERATION, message).with_subject(subject);
        let tree = self.codec.decode(body).map_err(|e| malformed(e.to_string()))?;

        let raw_status = codec::text_at(&tree, &["RECEPCIONDTE", "STATUS"])
            .ok_or_else(|| malformed("response carries no STATUS".into()))?;
        let code: i64 = raw_status
            .parse()
            .map_err(|_| malformed(format!("non-numeric STATUS '{raw_status}'")))?;
        let status = UploadStatus::from_code(code);

        if !status.is_success() {
            let mut message = status.meaning();
            let details = error_details(&tree);
            if !details.is_empty() {
                message.push_str(": ");
                message.push_str(&details.join("; "));
            }
            return Err(SiiError::Submission {
                operation: UPLOAD_OPERATION.to_string(),
                subject: subject.to_string(),
                code,
                message,
            });
        }

        let track_id = codec::text_at(&tree, &["RECEPCIONDTE", "TRACKID"])
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|id| *id > 0)
            .ok_or_else(|| malformed("accepted upload carries no TRACKID".into()))?;

        Ok(UploadReceipt {
            track_id,
            status,
            message: status.meaning(),
            timestamp: codec::text_at(&tree, &["RECEPCIONDTE", "TIMESTAMP"]),
        })
    }
}

fn write_temp_file(bytes: &[u8], compressed: bool) -> Result<NamedTempFile> {
    let suffix = if compressed { ".xml.gz" } else { ".xml" };
    let mut file = tempfile::Builder::new()
        .prefix("siilink-upload-")
        .suffix(suffix)
        .tempfile()
        .map_err(InfraError::from)?;
    file.write_all(bytes).map_err(InfraError::from)?;
    file.flush().map_err(InfraError::from)?;
    Ok(file)
}

fn error_details(tree: &serde_json::Value) -> Vec<String> {
    match codec::find(tree, &["RECEPCIONDTE", "DETAIL"]).and_then(|detail| detail.get("ERROR")) {
        Some(serde_json::Value::Array(items)) => items.iter().filter_map(codec::text).collect(),
        Some(single) => codec::text(single).into_iter().collect(),
        None => Vec::new(),
    }
}

fn transport_error(err: RetryError<String>, subject: &str) -> SiiError {
    let (attempts, failures) = match err {
        RetryError::Exhausted { attempts, failures } => (attempts, failures),
        RetryError::NonRetryable { attempt, error, mut failures } => {
            failures.push(error);
            (attempt, failures)
        }
    };

    SiiError::Transport {
        operation: UPLOAD_OPERATION.to_string(),
        function: UPLOAD_FUNCTION.to_string(),
        subject: Some(subject.to_string()),
        attempts,
        diagnostics: failures
            .iter()
            .enumerate()
            .map(|(i, failure)| format!("attempt {}: {failure}", i + 1))
            .collect(),
    }
}
