//! Protocol constants
//!
//! Centralized location for the fixed values of the SII protocol and the
//! defaults of the session layer.

// Retry budget
pub const DEFAULT_RETRY_BUDGET: u32 = 10;
pub const MAX_RETRY_BUDGET: u32 = 20;
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 200;

// Session token
pub const DEFAULT_TOKEN_TTL_SECS: u64 = 30;
pub const TOKEN_CACHE_KEY_PREFIX: &str = "sii_token_";

// Hosts
pub const PRODUCTION_BASE_URL: &str = "https://palena.sii.cl";
pub const CERTIFICATION_BASE_URL: &str = "https://maullin.sii.cl";
pub const UPLOAD_PATH: &str = "/cgi_dte/UPL/DTEUpload";

// Services and their functions
pub const SERVICE_SEED: &str = "CrSeed";
pub const FUNCTION_SEED: &str = "getSeed";
pub const SERVICE_TOKEN: &str = "GetTokenFromSeed";
pub const FUNCTION_TOKEN: &str = "getToken";
pub const SERVICE_SUBMISSION_STATUS: &str = "QueryEstUp";
pub const FUNCTION_SUBMISSION_STATUS: &str = "getEstUp";
pub const SERVICE_DOCUMENT_STATUS: &str = "QueryEstDte";
pub const FUNCTION_DOCUMENT_STATUS: &str = "getEstDte";
pub const SERVICE_DOCUMENT_SIGNATURE_STATUS: &str = "QueryEstDteAv";
pub const FUNCTION_DOCUMENT_SIGNATURE_STATUS: &str = "getEstDteAv";
pub const SERVICE_STATUS_EMAIL: &str = "wsDTECorreo";
pub const FUNCTION_STATUS_EMAIL: &str = "reenvioCorreo";

/// `ESTADO` value the seed and token services answer on success.
pub const AUTH_OK_SENTINEL: &str = "00";

/// Body the upload endpoint answers when it fails internally.
pub const UPLOAD_INTERNAL_ERROR_BODY: &str = "Error 500";

/// Declaration prepended to payloads that lack one.
pub const DOCUMENT_XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>"#;

pub const UPLOAD_USER_AGENT: &str = "Mozilla/4.0 (compatible; PROG 1.0; SiiLink)";
