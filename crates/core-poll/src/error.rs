//! Error types for the polling primitive

use thiserror::Error;

/// Errors raised while configuring a poller.
///
/// Failures observed *during* polling are never errors at this level; they are
/// reported through [`PollOutcome`](crate::PollOutcome) so the caller decides
/// how to surface them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    #[error("invalid poll configuration: {0}")]
    InvalidConfig(String),
}
