//! Contract negotiation: initiate against an offer, then await the agreement

use super::{settle, ProviderContext, DSP_PROTOCOL};
use crate::error::{DsxError, Result};
use crate::http::{EDC_NAMESPACE, ODRL_NAMESPACE};
use crate::models::{Negotiation, NegotiationState, Offer};
use dsx_core_poll::{Classification, Poller};
use serde_json::{json, Value};
use tracing::info;

const RESOURCE: &str = "negotiation";

/// Body of a `ContractRequest` for `offer`.
///
/// The offer policy is sent as-is with the provider as assigner and the
/// asset as target.
pub fn contract_request(ctx: &ProviderContext, offer: &Offer, request_id: &str) -> Value {
    let mut policy = offer.policy.clone();
    if let Some(obj) = policy.as_object_mut() {
        obj.insert("odrl:assigner".to_string(), json!({ "@id": ctx.provider_did }));
        obj.insert("odrl:target".to_string(), json!({ "@id": offer.asset_id }));
    }

    json!({
        "@context": { "edc": EDC_NAMESPACE, "odrl": ODRL_NAMESPACE },
        "@id": request_id,
        "@type": "ContractRequest",
        "counterPartyAddress": ctx.protocol_url,
        "counterPartyId": ctx.provider_did,
        "protocol": DSP_PROTOCOL,
        "policy": policy,
    })
}

/// Start a negotiation and return its id
pub fn initiate(ctx: &ProviderContext, offer: &Offer) -> Result<String> {
    initiate_with_id(ctx, offer, &uuid::Uuid::new_v4().to_string())
}

/// Start a negotiation under a caller-chosen id.
///
/// Repeating the call with the same id is safe: a `409 Conflict` answer
/// returns that id again.
pub fn initiate_with_id(
    ctx: &ProviderContext,
    offer: &Offer,
    request_id: &str,
) -> Result<String> {
    let url = ctx.management("/v3/contractnegotiations");
    let id = ctx
        .api
        .create(RESOURCE, &url, contract_request(ctx, offer, request_id))?;
    info!(negotiation_id = %id, asset_id = %offer.asset_id, "Negotiation initiated");
    Ok(id)
}

/// Classify one negotiation snapshot.
///
/// A finalized negotiation yields its agreement id, which may be missing.
pub fn classify(negotiation: &Negotiation) -> Classification<Option<String>> {
    match negotiation.state {
        NegotiationState::Finalized => Classification::Success(negotiation.agreement_id.clone()),
        NegotiationState::Terminated => {
            Classification::Failure("negotiation terminated".to_string())
        }
        ref other => Classification::pending(other.as_str()),
    }
}

/// Poll the negotiation until it is finalized, returning the agreement id
pub fn await_agreement(
    ctx: &ProviderContext,
    negotiation_id: &str,
    poller: &Poller,
) -> Result<String> {
    let url = ctx.management(&format!("/v3/contractnegotiations/{}", negotiation_id));
    let timeout = poller.config().fetch_timeout(ctx.api.request_timeout());

    let outcome = poller.poll(
        RESOURCE,
        || {
            ctx.api
                .get_json(&url, Some(timeout))
                .and_then(|doc| Negotiation::from_json(&doc))
        },
        classify,
    );

    let agreement = settle(RESOURCE, outcome, |_| NegotiationState::Terminated.to_string())?
        .ok_or_else(|| DsxError::MalformedTerminalState {
            resource: RESOURCE.to_string(),
            state: NegotiationState::Finalized.to_string(),
            field: "contractAgreementId".to_string(),
        })?;

    info!(agreement_id = %agreement, "Negotiation finalized");
    Ok(agreement)
}
