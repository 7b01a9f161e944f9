//! Transfer process: start an HTTP pull transfer and await STARTED

use super::{settle, ProviderContext, DSP_PROTOCOL};
use crate::error::Result;
use crate::http::api::edc_context;
use crate::models::{TransferProcess, TransferState};
use dsx_core_poll::{Classification, Poller};
use serde_json::{json, Value};
use tracing::info;

const RESOURCE: &str = "transfer";

/// Transfer type for consumer-pull over HTTP
pub const TRANSFER_TYPE: &str = "HttpData-PULL";

pub fn transfer_request(
    ctx: &ProviderContext,
    asset_id: &str,
    agreement_id: &str,
    request_id: &str,
) -> Value {
    json!({
        "@context": edc_context(),
        "@id": request_id,
        "@type": "TransferRequest",
        "counterPartyAddress": ctx.protocol_url,
        "counterPartyId": ctx.provider_did,
        "contractId": agreement_id,
        "assetId": asset_id,
        "protocol": DSP_PROTOCOL,
        "transferType": TRANSFER_TYPE,
        "dataDestination": { "@type": "DataAddress", "type": "HttpProxy" },
    })
}

/// Start a transfer under the agreement and return the transfer id
pub fn initiate(ctx: &ProviderContext, asset_id: &str, agreement_id: &str) -> Result<String> {
    initiate_with_id(ctx, asset_id, agreement_id, &uuid::Uuid::new_v4().to_string())
}

/// Same as [`initiate`] under a caller-chosen id; a 409 returns that id
pub fn initiate_with_id(
    ctx: &ProviderContext,
    asset_id: &str,
    agreement_id: &str,
    request_id: &str,
) -> Result<String> {
    let url = ctx.management("/v3/transferprocesses");
    let id = ctx.api.create(
        RESOURCE,
        &url,
        transfer_request(ctx, asset_id, agreement_id, request_id),
    )?;
    info!(transfer_id = %id, "Transfer initiated");
    Ok(id)
}

pub fn classify(transfer: &TransferProcess) -> Classification<()> {
    match transfer.state {
        TransferState::Started => Classification::Success(()),
        TransferState::Terminated => Classification::Failure("transfer terminated".to_string()),
        ref other => Classification::pending(other.as_str()),
    }
}

/// Poll the transfer until it is STARTED
pub fn await_started(ctx: &ProviderContext, transfer_id: &str, poller: &Poller) -> Result<()> {
    let url = ctx.management(&format!("/v3/transferprocesses/{}", transfer_id));
    let timeout = poller.config().fetch_timeout(ctx.api.request_timeout());

    let outcome = poller.poll(
        RESOURCE,
        || {
            ctx.api
                .get_json(&url, Some(timeout))
                .and_then(|doc| TransferProcess::from_json(&doc))
        },
        classify,
    );

    settle(RESOURCE, outcome, |_| TransferState::Terminated.to_string())?;
    info!(transfer_id, "Transfer started");
    Ok(())
}
