//! External service integrations

pub mod sii;
