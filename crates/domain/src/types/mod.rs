//! Domain types and models
//!
//! Identity, environment and the status taxonomies the SII services answer
//! with.

pub mod environment;
pub mod rut;
pub mod submission;
pub mod upload;
pub mod validation;

pub use environment::Environment;
pub use rut::Rut;
pub use submission::{SubmissionCounters, SubmissionState, SubmissionStatus};
pub use upload::{StatusEntry, UploadReceipt, UploadStatus};
pub use validation::{EmailRequestStatus, ValidationKind, ValidationOutcome, ValidationStatus};
