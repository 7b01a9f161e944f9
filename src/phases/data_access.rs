//! Data access: look up the EDR for a started transfer and pull the data

use super::ProviderContext;
use crate::error::{DsxError, Result};
use crate::http::{HttpClient, HttpRequest};
use crate::models::{DataPayload, Edr};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetch the first EDR recorded for `transfer_id` (one call, not polled)
pub fn retrieve_edr(ctx: &ProviderContext, transfer_id: &str) -> Result<Value> {
    let url = ctx.management(&format!("/v1/edrs?transferProcessId={}", transfer_id));
    let edrs = ctx.api.get_json(&url, None)?;

    let first = match edrs {
        Value::Array(mut items) if !items.is_empty() => items.swap_remove(0),
        Value::Array(_) => return Err(DsxError::NoEdrFound(transfer_id.to_string())),
        other => {
            return Err(DsxError::MalformedResponse(format!(
                "EDR list expected, got {}",
                other
            )))
        }
    };
    info!(transfer_id, "EDR retrieved");
    Ok(first)
}

/// Validate the EDR fields needed to call the data plane
pub fn extract_edr_details(edr: &Value) -> Result<Edr> {
    let details = Edr::from_json(edr)?;
    info!(endpoint = %details.endpoint, auth_key = %details.auth_key, "EDR details");
    debug!(?details);
    Ok(details)
}

/// Explanation for a data plane error status
pub fn status_cause(status: u16) -> &'static str {
    match status {
        401 => "token invalid/expired",
        403 => "agreement validation failed",
        404 => "wrong endpoint",
        502 | 504 => "backend unreachable",
        _ => "data plane request failed",
    }
}

/// Pull the data with one authenticated GET
pub fn access_data(http: &dyn HttpClient, edr: &Edr, timeout: Duration) -> Result<DataPayload> {
    let request = HttpRequest::get(edr.endpoint.as_str())
        .with_header(edr.auth_key.as_str(), edr.auth_code.as_str())
        .with_timeout(timeout);

    let response = http.execute(&request)?;
    if !response.is_success() {
        let cause = status_cause(response.status);
        warn!(status = response.status, cause, "Data access failed");
        return Err(DsxError::DataAccess {
            status: response.status,
            cause: cause.to_string(),
        });
    }

    let payload = DataPayload::new(response.status, response.body);
    info!(
        status = payload.status,
        bytes = payload.bytes,
        preview = %payload.preview,
        "Data retrieved"
    );
    Ok(payload)
}

/// Retrieve the EDR for `transfer_id` and pull the data behind it
pub fn fetch_data(ctx: &ProviderContext, transfer_id: &str) -> Result<DataPayload> {
    let edr = retrieve_edr(ctx, transfer_id)?;
    let details = extract_edr_details(&edr)?;
    access_data(ctx.http.as_ref(), &details, ctx.api.request_timeout())
}
