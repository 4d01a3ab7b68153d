//! Domain models for Certitude.
//!
//! - `OperationContext`: typed per-call context
//! - `ClassificationOutcome`: verdict on one response or one operation
//! - `HaltCode`: stable error codes carried by uncertainty halts

pub mod context;
pub mod error;
pub mod outcome;

pub use context::OperationContext;
pub use error::{CertitudeError, Result};
pub use outcome::{ClassificationOutcome, HaltCode, OutcomeStatus, ResponseData, UncertaintyHalt};
