//! Per-call request context

use std::fmt;
use std::sync::Arc;

use siilink_common::cache::TokenStore;
use siilink_domain::Environment;

use super::signer::Credential;
use crate::observability::fingerprint;

/// Which token store a context authenticates against.
#[derive(Clone, Default)]
pub enum CacheSelector {
    /// The store owned by the client.
    #[default]
    Shared,
    /// A caller-provided store.
    Custom(Arc<dyn TokenStore>),
}

impl fmt::Debug for CacheSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shared => f.write_str("Shared"),
            Self::Custom(store) => write!(f, "Custom({})", store.backend()),
        }
    }
}

/// Immutable description of who calls, against which environment, and how.
///
/// Holds no network resources; clone and reuse it freely.
#[derive(Clone)]
pub struct RequestContext {
    credential: Arc<dyn Credential>,
    environment: Environment,
    verify_ssl: bool,
    retry_budget: u32,
    cache: CacheSelector,
}

impl RequestContext {
    /// Context for `credential` with production, SSL verification on, the
    /// default retry budget and the shared cache.
    pub fn new(credential: Arc<dyn Credential>) -> Self {
        Self {
            credential,
            environment: Environment::default(),
            verify_ssl: true,
            retry_budget: 0,
            cache: CacheSelector::Shared,
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_verify_ssl(mut self, verify_ssl: bool) -> Self {
        self.verify_ssl = verify_ssl;
        self
    }

    /// Attempts per remote call. `0` uses the configured default; values
    /// above the hard maximum are clamped when the call runs.
    pub fn with_retry_budget(mut self, retry_budget: u32) -> Self {
        self.retry_budget = retry_budget;
        self
    }

    pub fn with_cache(mut self, cache: CacheSelector) -> Self {
        self.cache = cache;
        self
    }

    pub fn credential(&self) -> &dyn Credential {
        self.credential.as_ref()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn verify_ssl(&self) -> bool {
        self.verify_ssl
    }

    pub fn retry_budget(&self) -> u32 {
        self.retry_budget
    }

    pub fn cache(&self) -> &CacheSelector {
        &self.cache
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("identity", &fingerprint(&self.credential.identity()))
            .field("environment", &self.environment)
            .field("verify_ssl", &self.verify_ssl)
            .field("retry_budget", &self.retry_budget)
            .field("cache", &self.cache)
            .finish()
    }
}
