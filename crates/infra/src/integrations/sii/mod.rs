//! SII (Servicio de Impuestos Internos) session and RPC layer
//!
//! - [`endpoints`]: (environment, service) → endpoint URL
//! - [`auth`]: seed → sign → token handshake behind a token cache
//! - [`rpc`]: SOAP calls with bounded retries and linear backoff
//! - [`upload`]: multipart document submission
//! - [`queries`]: submission status, document validation and status-by-email
//! - [`client`]: the [`SiiClient`] facade tying them together
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use siilink_domain::{Environment, SiiConfig};
//! use siilink_infra::integrations::sii::SiiClient;
//!
//! let client = SiiClient::new(SiiConfig::default(), Arc::new(my_signer));
//! let ctx = client.context(Arc::new(my_certificate)).with_environment(Environment::Certification);
//! let status = client.check_submission_status(&ctx, &company, 76941002)?;
//! println!("{:?}", status.result.state);
//! ```

pub mod auth;
pub mod client;
pub mod context;
pub mod endpoints;
pub mod queries;
pub mod rpc;
pub mod signer;
pub mod upload;

pub use auth::{cache_key, Authenticator};
pub use client::{build_token_store, SiiClient, SiiClientBuilder};
pub use context::{CacheSelector, RequestContext};
pub use endpoints::{EndpointOrigin, EndpointResolver, ResolvedEndpoint};
pub use queries::{DocumentQuery, QueryResponse, SignedDocumentQuery};
pub use rpc::{CallInput, RemoteResponse, RpcExecutor, SoapArg};
pub use signer::{Credential, Signer};
pub use upload::{DocumentSubmitter, DocumentUpload};
