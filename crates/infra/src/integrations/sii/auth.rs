//! Seed → sign → token handshake and the token cache in front of it

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::{json, Value};
use siilink_common::cache::{sha256_hex, TokenStore};
use siilink_domain::constants::{
    AUTH_OK_SENTINEL, FUNCTION_SEED, FUNCTION_TOKEN, SERVICE_SEED, SERVICE_TOKEN,
    TOKEN_CACHE_KEY_PREFIX,
};
use siilink_domain::{AuthStep, Result, SiiError};
use tracing::{debug, info, warn};

use super::context::RequestContext;
use super::endpoints::EndpointResolver;
use super::rpc::{RemoteResponse, RpcExecutor, SoapArg};
use super::signer::{Credential, Signer};
use crate::codec::{self, MarkupCodec};
use crate::http::TransportOptions;
use crate::observability::fingerprint;

/// Cache key for the tokens of `credential`.
pub fn cache_key(credential: &dyn Credential) -> String {
    format!("{TOKEN_CACHE_KEY_PREFIX}{}", sha256_hex(&credential.identity()))
}

/// Document signed to exchange `seed` for a token.
pub fn seed_document(seed: &str) -> Value {
    json!({ "getToken": { "item": { "Semilla": seed } } })
}

/// Per-key locks so that only one caller per signer runs the handshake.
#[derive(Default)]
struct SingleFlight {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SingleFlight {
    fn lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        self.locks.lock().entry(key.to_string()).or_default().clone()
    }

    /// Forget the lock of `key` once no other caller holds or awaits it.
    fn release(&self, key: &str, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock();
        // Clones are only taken under the map lock, so the count is stable here.
        let unshared = Arc::strong_count(&lock) == 2;
        if unshared && locks.get(key).is_some_and(|held| Arc::ptr_eq(held, &lock)) {
            locks.remove(key);
        }
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

/// Obtains session tokens, reusing cached ones while they live.
pub struct Authenticator {
    executor: Arc<RpcExecutor>,
    resolver: Arc<EndpointResolver>,
    signer: Arc<dyn Signer>,
    codec: Arc<dyn MarkupCodec>,
    ttl: Duration,
    single_flight: Option<SingleFlight>,
}

impl Authenticator {
    pub fn new(
        executor: Arc<RpcExecutor>,
        resolver: Arc<EndpointResolver>,
        signer: Arc<dyn Signer>,
        codec: Arc<dyn MarkupCodec>,
        ttl: Duration,
    ) -> Self {
        Self { executor, resolver, signer, codec, ttl, single_flight: None }
    }

    /// Serialize cold-cache handshakes per signer.
    pub fn with_single_flight(mut self, enabled: bool) -> Self {
        self.single_flight = enabled.then(SingleFlight::default);
        self
    }

    /// Token for the signer of `ctx`, from `store` when live.
    ///
    /// # Errors
    /// `SiiError::Auth` naming the failed step, or `SiiError::Config` when an
    /// endpoint cannot be resolved.
    pub fn authenticate(
        &self,
        ctx: &RequestContext,
        store: &dyn TokenStore,
        budget: u32,
        options: &TransportOptions,
    ) -> Result<String> {
        let key = cache_key(ctx.credential());
        if let Some(token) = store.get(&key) {
            debug!(backend = store.backend(), "Using cached SII token");
            return Ok(token);
        }

        let Some(single_flight) = &self.single_flight else {
            return self.handshake(ctx, store, &key, budget, options);
        };

        let lock = single_flight.lock_for(&key);
        let outcome = {
            let _guard = lock.lock();
            match store.get(&key) {
                Some(token) => {
                    debug!(backend = store.backend(), "SII token issued by a concurrent caller");
                    Ok(token)
                }
                None => self.handshake(ctx, store, &key, budget, options),
            }
        };
        single_flight.release(&key, lock);
        outcome
    }

    fn handshake(
        &self,
        ctx: &RequestContext,
        store: &dyn TokenStore,
        key: &str,
        budget: u32,
        options: &TransportOptions,
    ) -> Result<String> {
        let seed = self.request_seed(ctx, budget, options)?;
        let signed = self.sign_seed(ctx, &seed)?;
        let token = self.exchange(ctx, &signed, budget, options)?;

        if let Err(e) = store.set(key, &token, self.ttl) {
            warn!(backend = store.backend(), error = %e, "Failed to cache SII token");
        }
        info!(
            environment = %ctx.environment(),
            token = %fingerprint(&token),
            ttl_secs = self.ttl.as_secs(),
            "SII session token issued"
        );
        Ok(token)
    }

    fn request_seed(
        &self,
        ctx: &RequestContext,
        budget: u32,
        options: &TransportOptions,
    ) -> Result<String> {
        let endpoint = self.resolver.resolve(ctx.environment(), SERVICE_SEED)?;
        let response = self
            .executor
            .call(&endpoint, FUNCTION_SEED, &[], budget, options)
            .map_err(|e| step_error(AuthStep::Seed, e))?;

        accepted_value(&response, AuthStep::Seed, "SEMILLA")
    }

    fn sign_seed(&self, ctx: &RequestContext, seed: &str) -> Result<String> {
        let document = self
            .codec
            .encode(&seed_document(seed))
            .map_err(|e| SiiError::auth(AuthStep::Sign, e.to_string()))?;

        let signed = self
            .signer
            .sign(&document, ctx.credential())
            .map_err(|e| SiiError::auth(AuthStep::Sign, e.to_string()))?;

        if signed.trim().is_empty() {
            return Err(SiiError::auth(AuthStep::Sign, "signer returned an empty document"));
        }
        Ok(signed)
    }

    fn exchange(
        &self,
        ctx: &RequestContext,
        signed: &str,
        budget: u32,
        options: &TransportOptions,
    ) -> Result<String> {
        let endpoint = self.resolver.resolve(ctx.environment(), SERVICE_TOKEN)?;
        let args = [SoapArg::new("pszXml", signed)];
        let response = self
            .executor
            .call(&endpoint, FUNCTION_TOKEN, &args, budget, options)
            .map_err(|e| step_error(AuthStep::Token, e))?;

        accepted_value(&response, AuthStep::Token, "TOKEN")
    }
}

fn step_error(step: AuthStep, err: SiiError) -> SiiError {
    match err {
        SiiError::Config(_) | SiiError::Auth { .. } => err,
        other => SiiError::auth(step, other.to_string()),
    }
}

/// `RESP_BODY/{field}` of a response whose `ESTADO` is the OK sentinel.
fn accepted_value(response: &RemoteResponse, step: AuthStep, field: &str) -> Result<String> {
    let tree = &response.tree;
    let state = codec::text_at(tree, &["RESPUESTA", "RESP_HDR", "ESTADO"]);
    let glosa = codec::text_at(tree, &["RESPUESTA", "RESP_HDR", "GLOSA"]);

    match state.as_deref() {
        Some(AUTH_OK_SENTINEL) => {}
        Some(state) => {
            let detail = glosa.map(|g| format!(": {g}")).unwrap_or_default();
            return Err(SiiError::auth(step, format!("SII answered ESTADO {state}{detail}")));
        }
        None => return Err(SiiError::auth(step, "response carries no ESTADO")),
    }

    codec::text_at(tree, &["RESPUESTA", "RESP_BODY", field])
        .ok_or_else(|| SiiError::auth(step, format!("response carries no {field}")))
}
