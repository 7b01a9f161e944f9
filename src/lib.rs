/*!
 * dsx - Dataspace transaction driver
 *
 * Drives a consumer through one complete exchange with an EDC-style provider:
 * - Prerequisite gate (component health, seeded assets, policies, data plane)
 * - Catalog discovery over DSP
 * - Contract negotiation polled to an agreement
 * - HTTP pull transfer polled to STARTED
 * - Data access through the endpoint data reference (EDR)
 * - Verifiable credential requests through the identity hub
 *
 * Every remote wait goes through the bounded poller in `dsx-core-poll`.
 */

pub mod cli_style;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod phases;
pub mod prerequisites;

// Re-export commonly used types
pub use config::{CredentialSpec, DsxConfig, LogLevel, PollSettings};
pub use credentials::{CredentialOutcome, CredentialRequester};
pub use error::{DsxError, ErrorKind, Result};
pub use http::{
    BlockingHttpClient, HttpClient, HttpMethod, HttpRequest, HttpResponse, MockHttpClient,
};
pub use orchestrator::{Phase, PhaseError, TransactionOrchestrator, TransactionReport};
pub use prerequisites::{PrerequisiteChecker, PrerequisiteReport};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
