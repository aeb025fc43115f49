//! # SiiLink Infrastructure
//!
//! Impure side of the SII session layer.
//!
//! This crate contains:
//! - Blocking HTTP transport (`reqwest`)
//! - XML markup codec (`quick-xml`)
//! - Configuration loading from environment variables and files
//! - Tracing setup
//! - The SII integration: endpoints, authentication, RPC executor, document
//!   upload and status queries
//!
//! ## Architecture
//! - Domain types and errors come from `siilink-domain`
//! - Token caches and retry primitives come from `siilink-common`

pub mod codec;
pub mod config;
pub mod errors;
pub mod http;
pub mod integrations;
pub mod observability;

// Re-export commonly used items
pub use codec::{MarkupCodec, XmlCodec};
pub use errors::InfraError;
pub use http::{BlockingHttpTransport, HttpTransport};
pub use integrations::sii::{
    CacheSelector, CallInput, Credential, DocumentQuery, DocumentUpload, QueryResponse,
    RequestContext, SiiClient, SignedDocumentQuery, Signer, SoapArg,
};
