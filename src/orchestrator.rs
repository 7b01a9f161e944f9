/*!
 * End-to-end transaction orchestration
 *
 * Sequences prerequisites → catalog → negotiation → transfer → data access,
 * stopping at the first failure. Remote resources created before a failure
 * are left in place and listed in the failure report.
 */

use crate::config::DsxConfig;
use crate::error::{DsxError, ErrorKind, Result};
use crate::http::HttpClient;
use crate::models::DataPayload;
use crate::phases::{catalog, data_access, negotiation, transfer, ProviderContext};
use crate::prerequisites::{wait_for_health, PrerequisiteChecker, PrerequisiteReport};
use chrono::{DateTime, Utc};
use dsx_core_poll::Poller;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, info_span, warn};

/// Stage of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prerequisites,
    Catalog,
    Negotiation,
    Transfer,
    DataAccess,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Prerequisites => "prerequisites",
            Phase::Catalog => "catalog",
            Phase::Negotiation => "negotiation",
            Phase::Transfer => "transfer",
            Phase::DataAccess => "data access",
        };
        write!(f, "{}", name)
    }
}

/// Identifiers produced so far, in phase order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditTrail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agreement_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_id: Option<String>,
}

impl AuditTrail {
    /// Remote resources this transaction created
    pub fn remote_resources(&self) -> Vec<String> {
        let mut resources = Vec::new();
        if let Some(ref id) = self.negotiation_id {
            resources.push(format!("contract negotiation {}", id));
        }
        if let Some(ref id) = self.agreement_id {
            resources.push(format!("contract agreement {}", id));
        }
        if let Some(ref id) = self.transfer_id {
            resources.push(format!("transfer process {}", id));
        }
        resources
    }
}

/// A transaction stopped in `phase`
#[derive(Debug, Error)]
#[error("{phase} phase failed: {error}")]
pub struct PhaseError {
    pub phase: Phase,
    #[source]
    pub error: DsxError,
    pub trail: AuditTrail,
}

impl PhaseError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn last_state(&self) -> Option<&str> {
        self.error.last_state()
    }

    pub fn exit_code(&self) -> i32 {
        self.error.exit_code()
    }

    /// Serializable summary for reports
    pub fn report(&self) -> FailureReport {
        FailureReport {
            phase: self.phase,
            kind: self.kind(),
            reason: self.error.to_string(),
            last_state: self.last_state().map(str::to_string),
            trail: self.trail.clone(),
            left_in_place: self.trail.remote_resources(),
        }
    }
}

/// What went wrong and what was left behind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureReport {
    pub phase: Phase,
    pub kind: ErrorKind,
    pub reason: String,
    pub last_state: Option<String>,
    pub trail: AuditTrail,
    pub left_in_place: Vec<String>,
}

/// Result of a successful transaction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransactionReport {
    pub asset_id: String,
    pub negotiation_id: String,
    pub agreement_id: String,
    pub transfer_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub data: DataPayload,
    /// None when prerequisite verification was skipped
    pub prerequisites: Option<PrerequisiteReport>,
}

fn fail(phase: Phase, trail: &AuditTrail, error: DsxError) -> PhaseError {
    error!(%phase, kind = %error.kind(), %error, "Phase failed");
    let resources = trail.remote_resources();
    if !resources.is_empty() {
        warn!(?resources, "Remote resources left in place");
    }
    PhaseError {
        phase,
        error,
        trail: trail.clone(),
    }
}

impl TransactionReport {
    pub fn elapsed_secs(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

/// Drives one transaction at a time against one provider
pub struct TransactionOrchestrator {
    provider: ProviderContext,
    checker: PrerequisiteChecker,
    negotiation_poller: Poller,
    transfer_poller: Poller,
    health_poller: Option<Poller>,
    skip_prerequisites: bool,
}

impl TransactionOrchestrator {
    pub fn new(config: &DsxConfig, http: Arc<dyn HttpClient>) -> Result<Self> {
        let health_poller = if config.transaction.wait_for_health {
            Some(Poller::new(config.polling.health.to_poll_config()?))
        } else {
            None
        };

        Ok(Self {
            provider: ProviderContext::from_config(config, http.clone()),
            checker: PrerequisiteChecker::new(config, http),
            negotiation_poller: Poller::new(config.polling.negotiation.to_poll_config()?),
            transfer_poller: Poller::new(config.polling.transfer.to_poll_config()?),
            health_poller,
            skip_prerequisites: config.transaction.skip_prerequisites,
        })
    }

    /// Replace the negotiation and transfer pollers
    pub fn with_pollers(mut self, negotiation: Poller, transfer: Poller) -> Self {
        self.negotiation_poller = negotiation;
        self.transfer_poller = transfer;
        self
    }

    pub fn skip_prerequisites(mut self, skip: bool) -> Self {
        self.skip_prerequisites = skip;
        self
    }

    pub fn provider(&self) -> &ProviderContext {
        &self.provider
    }

    fn verify_prerequisites(&self) -> Result<PrerequisiteReport> {
        if let Some(ref poller) = self.health_poller {
            for (component, url) in self.checker.health_endpoints() {
                wait_for_health(
                    self.provider.http.as_ref(),
                    component,
                    url,
                    poller,
                    self.provider.api.request_timeout(),
                )?;
            }
        }
        let report = self.checker.run();
        report.gate()?;
        Ok(report)
    }

    /// Run the whole transaction for `target_asset_id`
    pub fn run(&self, target_asset_id: &str) -> std::result::Result<TransactionReport, PhaseError> {
        let span = info_span!("transaction", target_asset = target_asset_id);
        let _enter = span.enter();
        let started_at = Utc::now();
        let mut trail = AuditTrail::default();

        let prerequisites = if self.skip_prerequisites {
            warn!("Skipping prerequisite verification");
            None
        } else {
            let _phase = info_span!("phase", phase = %Phase::Prerequisites).entered();
            Some(
                self.verify_prerequisites()
                    .map_err(|e| fail(Phase::Prerequisites, &trail, e))?,
            )
        };

        let offer = {
            let _phase = info_span!("phase", phase = %Phase::Catalog).entered();
            catalog::discover(&self.provider, target_asset_id)
                .map_err(|e| fail(Phase::Catalog, &trail, e))?
        };
        trail.asset_id = Some(offer.asset_id.clone());

        let (negotiation_id, agreement_id) = {
            let _phase = info_span!("phase", phase = %Phase::Negotiation).entered();
            let negotiation_id = negotiation::initiate(&self.provider, &offer)
                .map_err(|e| fail(Phase::Negotiation, &trail, e))?;
            trail.negotiation_id = Some(negotiation_id.clone());

            let agreement_id = negotiation::await_agreement(
                &self.provider,
                &negotiation_id,
                &self.negotiation_poller,
            )
            .map_err(|e| fail(Phase::Negotiation, &trail, e))?;
            (negotiation_id, agreement_id)
        };
        trail.agreement_id = Some(agreement_id.clone());

        let transfer_id = {
            let _phase = info_span!("phase", phase = %Phase::Transfer).entered();
            let transfer_id = transfer::initiate(&self.provider, &offer.asset_id, &agreement_id)
                .map_err(|e| fail(Phase::Transfer, &trail, e))?;
            trail.transfer_id = Some(transfer_id.clone());

            transfer::await_started(&self.provider, &transfer_id, &self.transfer_poller)
                .map_err(|e| fail(Phase::Transfer, &trail, e))?;
            transfer_id
        };

        let data = {
            let _phase = info_span!("phase", phase = %Phase::DataAccess).entered();
            data_access::fetch_data(&self.provider, &transfer_id)
                .map_err(|e| fail(Phase::DataAccess, &trail, e))?
        };

        info!(
            asset_id = %offer.asset_id,
            %negotiation_id,
            %agreement_id,
            %transfer_id,
            "Transaction completed"
        );

        Ok(TransactionReport {
            asset_id: offer.asset_id,
            negotiation_id,
            agreement_id,
            transfer_id,
            started_at,
            completed_at: Utc::now(),
            data,
            prerequisites,
        })
    }
}
