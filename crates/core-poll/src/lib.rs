//! dsx Core Poll: pure-logic bounded polling for asynchronous resources
//!
//! # Overview
//!
//! Dataspace management APIs are asynchronous. Submitting a contract
//! negotiation, a transfer process or a credential request creates a remote
//! resource in a non-terminal state; the outcome only becomes visible by
//! fetching that resource again until it settles. This crate provides the one
//! loop every such call site shares:
//!
//! - **Poller**: sequential fetch → classify → sleep loop with an attempt budget
//! - **Classification**: the caller's verdict on one fetched representation
//! - **PollOutcome**: success, terminal failure, fetch failure, or timeout
//!
//! # Key Principles
//!
//! This crate is **pure logic** with zero knowledge of:
//! - HTTP, JSON, or any wire format
//! - Which states a given service considers terminal
//! - How the caller wants to report failures
//!
//! The caller supplies both the fetch operation and the state classifier.
//!
//! # Architecture
//!
//! ```text
//!        ┌──────────────┐
//!        │    fetch()   │ ── Err ──────────────▶ FetchFailed (no retry)
//!        └──────┬───────┘
//!               │ snapshot
//!               ▼
//!        ┌──────────────┐
//!        │  classify()  │ ── Success ──────────▶ Success(payload)
//!        └──────┬───────┘ ── Failure ──────────▶ Failure(reason)
//!               │ Pending
//!               ▼
//!      attempts remaining? ── no ──────────────▶ Timeout { attempts, last_state }
//!               │ yes
//!               ▼
//!        sleep(interval) ──▶ back to fetch()
//! ```
//!
//! # Usage Example
//!
//! ```
//! use dsx_core_poll::{Classification, PollConfig, PollOutcome, Poller};
//! use std::time::Duration;
//!
//! let config = PollConfig::new(60, Duration::from_millis(1)).unwrap();
//! let poller = Poller::new(config);
//!
//! let mut polls = 0;
//! let outcome = poller.poll(
//!     "transfer",
//!     || {
//!         polls += 1;
//!         Ok::<_, String>(if polls < 3 { "REQUESTED" } else { "STARTED" })
//!     },
//!     |state| match *state {
//!         "STARTED" => Classification::Success(()),
//!         "TERMINATED" => Classification::Failure("transfer terminated".into()),
//!         other => Classification::pending(other),
//!     },
//! );
//!
//! assert_eq!(outcome, PollOutcome::Success(()));
//! ```

pub mod error;
pub mod poller;

// Re-export main types for convenience
pub use error::PollError;
pub use poller::{Classification, PollConfig, PollOutcome, Poller};

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use dsx_core_poll::prelude::*;
/// ```
pub mod prelude {
    pub use super::error::PollError;
    pub use super::poller::{Classification, PollConfig, PollOutcome, Poller};
}
