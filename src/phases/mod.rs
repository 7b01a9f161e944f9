/*!
 * Transaction phases
 *
 * Each phase is a set of free functions over a [`ProviderContext`]. Data
 * flows strictly forward:
 *
 * ```text
 * catalog ──(asset id, policy)──▶ negotiation ──agreement id──▶ transfer ──transfer id──▶ data access
 * ```
 *
 * Phases never retry on their own; the only repetition is the bounded
 * polling of negotiation and transfer state.
 */

pub mod catalog;
pub mod data_access;
pub mod negotiation;
pub mod transfer;

use crate::config::DsxConfig;
use crate::error::{DsxError, Result};
use crate::http::{ApiClient, HttpClient};
use dsx_core_poll::PollOutcome;
use std::sync::Arc;

/// Protocol identifier sent as `protocol` on DSP-bound requests
pub const DSP_PROTOCOL: &str = "dataspace-protocol-http";

/// Provider endpoints and credentials shared by every phase
#[derive(Clone)]
pub struct ProviderContext {
    /// Management API client (`X-Api-Key` = management key)
    pub api: ApiClient,
    /// Raw transport, for calls that must not carry the management key
    pub http: Arc<dyn HttpClient>,
    pub management_url: String,
    pub protocol_url: String,
    pub provider_did: String,
}

impl std::fmt::Debug for ProviderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderContext")
            .field("api", &self.api)
            .field("management_url", &self.management_url)
            .field("protocol_url", &self.protocol_url)
            .field("provider_did", &self.provider_did)
            .finish_non_exhaustive()
    }
}

impl ProviderContext {
    pub fn from_config(config: &DsxConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            api: ApiClient::new(
                http.clone(),
                config.provider.management_api_key.clone(),
                config.http.request_timeout(),
            ),
            http,
            management_url: config.provider.management_url(),
            protocol_url: config.provider.protocol_url(),
            provider_did: config.provider.did(),
        }
    }

    /// Absolute management API URL for `path` (which starts with `/`)
    pub fn management(&self, path: &str) -> String {
        format!("{}{}", self.management_url, path)
    }
}

/// Convert a poll outcome into the phase result.
///
/// `terminal_state` maps a failure reason to the remote state label that
/// produced it.
pub fn settle<T, F>(
    resource: &str,
    outcome: PollOutcome<T, DsxError>,
    terminal_state: F,
) -> Result<T>
where
    F: FnOnce(&str) -> String,
{
    match outcome {
        PollOutcome::Success(value) => Ok(value),
        PollOutcome::Failure(reason) => Err(DsxError::ProtocolTerminal {
            resource: resource.to_string(),
            state: terminal_state(&reason),
            reason,
        }),
        PollOutcome::FetchFailed(err) => Err(err),
        PollOutcome::Timeout {
            attempts,
            last_state,
        } => Err(DsxError::PollTimeout {
            resource: resource.to_string(),
            attempts,
            last_state,
        }),
    }
}
