//! Contracts for the external services this backend delegates to, plus the
//! simulated implementations wired in by default. The core treats every
//! collaborator as a black box returning success or failure; a failure maps
//! to a retryable 502 and never leaves partial state behind.

use thiserror::Error;

pub mod cv;
pub mod payment;
pub mod questions;

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CollaboratorError(pub String);
