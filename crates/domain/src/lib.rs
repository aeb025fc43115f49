//! # SiiLink Domain
//!
//! Domain types for the SII session and RPC layer.
//!
//! This crate contains:
//! - Error types and the `Result` alias
//! - Identity (`Rut`) and environment types
//! - Status taxonomies for uploads, submissions and validations
//! - Configuration structures and protocol constants
//!
//! ## Architecture
//! - No dependencies on other SiiLink crates
//! - Pure data, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
