/*!
 * Credential issuance through the provider's identity hub
 *
 * The identity hub forwards the request to the issuer and answers with a
 * `Location` header naming a status resource. That resource is polled until
 * it reports `ISSUED`, `FAILED` or `REJECTED`.
 *
 * The identity hub omits its own context path from `Location`, so the header
 * is normalized before polling.
 */

use crate::config::{CredentialSpec, DsxConfig};
use crate::error::{DsxError, Result};
use crate::http::{ApiClient, HttpClient, HttpRequest};
use crate::models::{CredentialRequestStatus, CredentialStatus};
use crate::phases::settle;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use dsx_core_poll::{Classification, Poller};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, info_span, warn};

const RESOURCE: &str = "credential request";

/// How a credential request ended when it did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CredentialOutcome {
    /// Status resource reported ISSUED
    Issued { status_url: String },
    /// The request was accepted but no status resource was named, so
    /// issuance could not be observed
    Indeterminate { reason: String },
}

impl CredentialOutcome {
    pub fn is_issued(&self) -> bool {
        matches!(self, CredentialOutcome::Issued { .. })
    }
}

/// Participant context id: the DID, base64url-encoded without padding
pub fn participant_context_id(did: &str) -> String {
    URL_SAFE_NO_PAD.encode(did.as_bytes())
}

pub fn request_body(issuer_did: &str, holder_pid: &str, specs: &[CredentialSpec]) -> Value {
    let credentials: Vec<Value> = specs
        .iter()
        .map(|spec| {
            json!({
                "format": spec.format,
                "type": spec.credential_type,
                "id": spec.definition_id,
            })
        })
        .collect();

    json!({
        "issuerDid": issuer_did,
        "holderPid": holder_pid,
        "credentials": credentials,
    })
}

/// Rewrite a `Location` header so it points into the identity API.
///
/// - absolute URL: the context path is prepended to its path unless present
/// - path starting with the context path: resolved against the identity origin
/// - any other absolute path: resolved against the identity base URL
pub fn normalize_location(
    location: &str,
    identity_url: &str,
    context_path: &str,
) -> Result<String> {
    let location = location.trim();
    let context_path = context_path.trim_end_matches('/');

    if location.starts_with("http://") || location.starts_with("https://") {
        let mut url = url::Url::parse(location).map_err(|e| {
            DsxError::MalformedResponse(format!("invalid Location '{}': {}", location, e))
        })?;
        if !context_path.is_empty() && !has_path_prefix(url.path(), context_path) {
            let path = format!("{}{}", context_path, url.path());
            url.set_path(&path);
        }
        return Ok(url.to_string());
    }

    if location.starts_with('/') {
        if !context_path.is_empty() && has_path_prefix(location, context_path) {
            let base = url::Url::parse(identity_url).map_err(|e| {
                DsxError::Config(format!("invalid identity URL '{}': {}", identity_url, e))
            })?;
            let origin = base.origin().ascii_serialization();
            return Ok(format!("{}{}", origin, location));
        }
        return Ok(format!("{}{}", identity_url.trim_end_matches('/'), location));
    }

    Err(DsxError::MalformedResponse(format!(
        "unsupported Location header '{}'",
        location
    )))
}

/// `prefix` matches whole leading path segments of `path`
fn has_path_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
        None => false,
    }
}

pub fn classify(status: &CredentialRequestStatus) -> Classification<()> {
    match status.status {
        CredentialStatus::Issued => Classification::Success(()),
        CredentialStatus::Failed | CredentialStatus::Rejected => {
            Classification::Failure(status.status.to_string())
        }
        ref other => Classification::pending(other.as_str()),
    }
}

/// Drives credential requests for one participant
#[derive(Debug, Clone)]
pub struct CredentialRequester {
    api: ApiClient,
    identity_url: String,
    context_path: String,
    participant_did: String,
    issuer_did: String,
    holder_pid: String,
    poller: Poller,
}

impl CredentialRequester {
    pub fn new(config: &DsxConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(
                http,
                config.identity.superuser_key.clone(),
                config.http.request_timeout(),
            ),
            identity_url: config.identity_url(),
            context_path: config.identity.context_path.clone(),
            participant_did: config.provider.did(),
            issuer_did: config.issuer.did(),
            holder_pid: config.credentials.holder_pid.clone(),
            poller: Poller::new(config.polling.credential.to_poll_config()?),
        })
    }

    /// Replace the status poller (tests use an instant one)
    pub fn with_poller(mut self, poller: Poller) -> Self {
        self.poller = poller;
        self
    }

    pub fn request_url(&self) -> String {
        format!(
            "{}/v1alpha/participants/{}/credentials/request",
            self.identity_url,
            participant_context_id(&self.participant_did)
        )
    }

    /// Submit the request; returns the normalized status URL when the
    /// response names one
    pub fn submit(&self, specs: &[CredentialSpec]) -> Result<Option<String>> {
        let url = self.request_url();
        let body = request_body(&self.issuer_did, &self.holder_pid, specs);
        info!(
            issuer = %self.issuer_did,
            types = ?specs.iter().map(|s| s.credential_type.as_str()).collect::<Vec<_>>(),
            "Requesting credentials"
        );

        let response = self
            .api
            .send(HttpRequest::post_json(&url, &body))
            .and_then(|r| r.require_success(&url))
            .map_err(|e| DsxError::InitiationFailed {
                resource: RESOURCE.to_string(),
                source: Box::new(e),
            })?;

        match response.header("Location") {
            Some(location) => {
                let status_url =
                    normalize_location(location, &self.identity_url, &self.context_path)?;
                info!(%status_url, "Credential request accepted");
                Ok(Some(status_url))
            }
            None => Ok(None),
        }
    }

    /// Poll the status URL until the credentials are issued
    pub fn await_issued(&self, status_url: &str) -> Result<()> {
        let timeout = self.poller.config().fetch_timeout(self.api.request_timeout());
        let outcome = self.poller.poll(
            RESOURCE,
            || {
                self.api
                    .get_json(status_url, Some(timeout))
                    .and_then(|doc| CredentialRequestStatus::from_json(&doc))
            },
            classify,
        );
        settle(RESOURCE, outcome, |status| status.to_string())?;
        info!("Credentials issued");
        Ok(())
    }

    /// Request the credentials and wait for their issuance
    pub fn request_credentials(&self, specs: &[CredentialSpec]) -> Result<CredentialOutcome> {
        let span = info_span!("credentials", participant = %self.participant_did);
        let _enter = span.enter();

        match self.submit(specs)? {
            Some(status_url) => {
                self.await_issued(&status_url)?;
                Ok(CredentialOutcome::Issued { status_url })
            }
            None => {
                warn!("No Location header in response, cannot observe issuance");
                Ok(CredentialOutcome::Indeterminate {
                    reason: "response carried no Location header".to_string(),
                })
            }
        }
    }
}
