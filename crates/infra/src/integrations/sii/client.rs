//! SII client facade
//!
//! [`SiiClient`] wires the resolver, executor, authenticator and submitter
//! together and owns the shared token store. Every operation takes a
//! [`RequestContext`]; the HTTP transport is never exposed.

use std::path::PathBuf;
use std::sync::Arc;

use siilink_common::cache::{FileTokenStore, MemoryTokenStore, TokenStore};
use siilink_common::resilience::{LinearBackoff, Sleeper, ThreadSleeper};
use siilink_domain::constants::{
    FUNCTION_DOCUMENT_SIGNATURE_STATUS, FUNCTION_DOCUMENT_STATUS, FUNCTION_STATUS_EMAIL,
    FUNCTION_SUBMISSION_STATUS, SERVICE_DOCUMENT_SIGNATURE_STATUS, SERVICE_DOCUMENT_STATUS,
    SERVICE_STATUS_EMAIL, SERVICE_SUBMISSION_STATUS,
};
use siilink_domain::{
    resolve_retry_budget, CacheBackend, CacheConfig, EmailRequestStatus, Result, Rut, SiiConfig,
    SiiError, SubmissionStatus, UploadReceipt, ValidationKind, ValidationStatus,
};
use tracing::warn;

use super::auth::{cache_key, Authenticator};
use super::context::{CacheSelector, RequestContext};
use super::endpoints::EndpointResolver;
use super::queries::{self, DocumentQuery, QueryResponse, SignedDocumentQuery};
use super::rpc::{CallInput, RemoteResponse, RpcExecutor, SoapArg};
use super::signer::{Credential, Signer};
use super::upload::{prepare_payload, DocumentSubmitter, DocumentUpload};
use crate::codec::{MarkupCodec, XmlCodec};
use crate::errors::InfraError;
use crate::http::{BlockingHttpTransport, HttpTransport, TransportOptions};

/// Build the store selected by `config`, falling back to memory when the
/// filesystem backend cannot be opened.
pub fn build_token_store(config: &CacheConfig) -> Arc<dyn TokenStore> {
    match config.backend {
        CacheBackend::Memory => Arc::new(MemoryTokenStore::new()),
        CacheBackend::Filesystem => {
            let directory = config.directory.clone().unwrap_or_else(default_cache_directory);
            match FileTokenStore::open(&directory) {
                Ok(store) => Arc::new(store),
                Err(e) => {
                    warn!(
                        directory = %directory.display(),
                        error = %e,
                        "Filesystem token cache unavailable, using memory"
                    );
                    Arc::new(MemoryTokenStore::new())
                }
            }
        }
    }
}

/// Builder for [`SiiClient`].
pub struct SiiClientBuilder {
    config: SiiConfig,
    signer: Arc<dyn Signer>,
    transport: Option<Arc<dyn HttpTransport>>,
    codec: Option<Arc<dyn MarkupCodec>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    token_store: Option<Arc<dyn TokenStore>>,
}

impl SiiClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn MarkupCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Shared store; defaults to the backend named in the configuration.
    pub fn token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    pub fn build(self) -> SiiClient {
        let Self { config, signer, transport, codec, sleeper, token_store } = self;

        let transport = transport.unwrap_or_else(|| Arc::new(BlockingHttpTransport::new()));
        let codec = codec.unwrap_or_else(|| Arc::new(XmlCodec::new()));
        let sleeper = sleeper.unwrap_or_else(|| Arc::new(ThreadSleeper));
        let shared_store = token_store.unwrap_or_else(|| build_token_store(&config.cache));
        let backoff = LinearBackoff::new(config.backoff_base());

        let resolver = Arc::new(EndpointResolver::new(&config.endpoints));
        let executor = Arc::new(RpcExecutor::new(
            transport.clone(),
            codec.clone(),
            sleeper.clone(),
            backoff,
        ));
        let authenticator = Authenticator::new(
            executor.clone(),
            resolver.clone(),
            signer,
            codec.clone(),
            config.token_ttl(),
        )
        .with_single_flight(config.single_flight);
        let submitter = DocumentSubmitter::new(transport, codec, sleeper, backoff);

        SiiClient { config, resolver, executor, authenticator, submitter, shared_store }
    }
}

/// Entry point to the SII services.
pub struct SiiClient {
    config: SiiConfig,
    resolver: Arc<EndpointResolver>,
    executor: Arc<RpcExecutor>,
    authenticator: Authenticator,
    submitter: DocumentSubmitter,
    shared_store: Arc<dyn TokenStore>,
}

impl SiiClient {
    /// Client with the default transport, codec and cache backend.
    pub fn new(config: SiiConfig, signer: Arc<dyn Signer>) -> Self {
        Self::builder(config, signer).build()
    }

    pub fn builder(config: SiiConfig, signer: Arc<dyn Signer>) -> SiiClientBuilder {
        SiiClientBuilder {
            config,
            signer,
            transport: None,
            codec: None,
            sleeper: None,
            token_store: None,
        }
    }

    pub fn config(&self) -> &SiiConfig {
        &self.config
    }

    /// Context for `credential` pre-filled from the configuration.
    pub fn context(&self, credential: Arc<dyn Credential>) -> RequestContext {
        RequestContext::new(credential)
            .with_environment(self.config.environment)
            .with_verify_ssl(self.config.verify_ssl)
            .with_retry_budget(self.config.retry_budget)
    }

    /// Session token for the signer of `ctx`.
    pub fn authenticate(&self, ctx: &RequestContext) -> Result<String> {
        let store = self.store_for(ctx);
        let options = self.options(ctx);
        self.authenticator.authenticate(ctx, store.as_ref(), self.budget(ctx, None), &options)
    }

    /// Drop the cached token of the signer of `ctx`.
    pub fn invalidate_token(&self, ctx: &RequestContext) -> Result<()> {
        self.store_for(ctx)
            .remove(&cache_key(ctx.credential()))
            .map_err(|e| InfraError::from(e).into())
    }

    /// Call `function` of `service` with the generic retry policy.
    ///
    /// `input` is an argument list, a bare retry budget, or both.
    pub fn call(
        &self,
        ctx: &RequestContext,
        service: &str,
        function: &str,
        input: impl Into<CallInput>,
    ) -> Result<RemoteResponse> {
        let (args, budget) = input.into().into_parts();
        let endpoint = self.resolver.resolve(ctx.environment(), service)?;
        let options = self.options(ctx);
        self.executor.call(&endpoint, function, &args, self.budget(ctx, budget), &options)
    }

    /// Upload a signed envelope and return its track id receipt.
    pub fn submit_document(
        &self,
        ctx: &RequestContext,
        document: &DocumentUpload,
    ) -> Result<UploadReceipt> {
        let sender = actor(document.sender, ctx, "sender")?;
        prepare_payload(&document.payload)?;
        let url = self.resolver.upload_url(ctx.environment())?;
        let token = self.authenticate(ctx)?;

        let options = self.options(ctx);
        self.submitter.submit(&url, &token, &sender, document, self.budget(ctx, None), &options)
    }

    /// `QueryEstUp.getEstUp`
    pub fn check_submission_status(
        &self,
        ctx: &RequestContext,
        company: &Rut,
        track_id: u64,
    ) -> Result<QueryResponse<SubmissionStatus>> {
        let mut args = queries::submission_status_args(company, track_id, "")?;
        queries::attach_token(&mut args, &self.authenticate(ctx)?);

        self.query(
            ctx,
            (SERVICE_SUBMISSION_STATUS, FUNCTION_SUBMISSION_STATUS),
            args,
            queries::track_subject(company, track_id),
            |response| queries::parse_submission_status(response, track_id),
        )
    }

    /// `QueryEstDte.getEstDte`
    pub fn validate_document(
        &self,
        ctx: &RequestContext,
        query: &DocumentQuery,
    ) -> Result<QueryResponse<ValidationStatus>> {
        let requester = actor(query.requester, ctx, "requester")?;
        let mut args = queries::document_status_args(query, &requester, "")?;
        queries::attach_token(&mut args, &self.authenticate(ctx)?);

        self.query(
            ctx,
            (SERVICE_DOCUMENT_STATUS, FUNCTION_DOCUMENT_STATUS),
            args,
            queries::document_subject(query),
            |response| queries::parse_validation_status(response, ValidationKind::Document),
        )
    }

    /// `QueryEstDteAv.getEstDteAv`
    pub fn validate_document_signature(
        &self,
        ctx: &RequestContext,
        query: &SignedDocumentQuery,
    ) -> Result<QueryResponse<ValidationStatus>> {
        let mut args = queries::document_signature_status_args(query, "")?;
        queries::attach_token(&mut args, &self.authenticate(ctx)?);

        self.query(
            ctx,
            (SERVICE_DOCUMENT_SIGNATURE_STATUS, FUNCTION_DOCUMENT_SIGNATURE_STATUS),
            args,
            queries::document_subject(&query.document),
            |response| {
                queries::parse_validation_status(response, ValidationKind::DocumentSignature)
            },
        )
    }

    /// `wsDTECorreo.reenvioCorreo`
    pub fn request_status_by_email(
        &self,
        ctx: &RequestContext,
        company: &Rut,
        track_id: u64,
    ) -> Result<QueryResponse<EmailRequestStatus>> {
        let mut args = queries::status_email_args(company, track_id, "")?;
        queries::attach_token(&mut args, &self.authenticate(ctx)?);

        self.query(
            ctx,
            (SERVICE_STATUS_EMAIL, FUNCTION_STATUS_EMAIL),
            args,
            queries::track_subject(company, track_id),
            |response| queries::parse_email_status(response, track_id),
        )
    }

    /// Run a token-bearing query; failures name `subject`.
    fn query<T>(
        &self,
        ctx: &RequestContext,
        (service, function): (&str, &str),
        args: Vec<SoapArg>,
        subject: String,
        parse: impl FnOnce(&RemoteResponse) -> Result<T>,
    ) -> Result<QueryResponse<T>> {
        let endpoint = self.resolver.resolve(ctx.environment(), service)?;
        let options = self.options(ctx);
        let response = self
            .executor
            .call(&endpoint, function, &args, self.budget(ctx, None), &options)
            .map_err(|e| e.with_subject(subject.as_str()))?;
        let result = parse(&response).map_err(|e| e.with_subject(subject))?;
        Ok(QueryResponse { result, arguments: args, raw: response.raw })
    }

    fn store_for(&self, ctx: &RequestContext) -> Arc<dyn TokenStore> {
        match ctx.cache() {
            CacheSelector::Shared => self.shared_store.clone(),
            CacheSelector::Custom(store) => store.clone(),
        }
    }

    fn budget(&self, ctx: &RequestContext, requested: Option<u32>) -> u32 {
        let configured = self.config.effective_retry_budget();
        resolve_retry_budget(requested.unwrap_or(ctx.retry_budget()), configured)
    }

    fn options(&self, ctx: &RequestContext) -> TransportOptions {
        if !ctx.verify_ssl() && ctx.environment().is_production() {
            warn!("SSL certificate verification is disabled against the production environment");
        }
        TransportOptions::from_config(&self.config.http, ctx.verify_ssl())
    }
}

fn actor(explicit: Option<Rut>, ctx: &RequestContext, role: &str) -> Result<Rut> {
    explicit.or_else(|| ctx.credential().holder_rut()).ok_or_else(|| {
        SiiError::Config(format!("no {role} RUT given and the credential does not carry one"))
    })
}

/// Default directory of the filesystem token cache.
pub fn default_cache_directory() -> PathBuf {
    std::env::temp_dir().join("siilink-tokens")
}
