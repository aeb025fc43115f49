//! Signing collaborators
//!
//! XML digital signatures are produced outside this crate. The session layer
//! only needs an opaque credential with a stable identity and something that
//! can sign an XML fragment with it.

use siilink_domain::{Result, Rut};

/// Opaque handle to signing material (certificate plus private key).
pub trait Credential: Send + Sync {
    /// Stable identity of the signer. Two credentials with the same identity
    /// share cached session tokens.
    fn identity(&self) -> String;

    /// RUT of the certificate holder, used as sender or requester when a
    /// call does not name one explicitly.
    fn holder_rut(&self) -> Option<Rut> {
        None
    }
}

/// Produces an enveloped XML signature.
pub trait Signer: Send + Sync {
    /// Sign `xml` with `credential` and return the signed document.
    fn sign(&self, xml: &str, credential: &dyn Credential) -> Result<String>;
}
