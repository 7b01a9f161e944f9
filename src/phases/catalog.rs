//! Catalog discovery: find the target asset and its offer policy

use super::{ProviderContext, DSP_PROTOCOL};
use crate::error::{DsxError, Result};
use crate::http::api::edc_context;
use crate::models::Offer;
use serde_json::{json, Value};
use tracing::{debug, info};

/// Request the provider's catalog (one call, not polled)
pub fn request_catalog(ctx: &ProviderContext) -> Result<Value> {
    let url = ctx.management("/v3/catalog/request");
    let body = json!({
        "@context": edc_context(),
        "@type": "CatalogRequest",
        "counterPartyAddress": ctx.protocol_url,
        "counterPartyId": ctx.provider_did,
        "protocol": DSP_PROTOCOL,
        "querySpec": { "filterExpression": [] },
    });

    let catalog = ctx.api.post_json(&url, &body)?;
    debug!(catalog = %catalog, "Catalog received");
    Ok(catalog)
}

/// Pick the dataset whose `@id` equals `target_asset_id`.
///
/// `dcat:dataset` may be a single object or an array.
pub fn extract_offer(catalog: &Value, target_asset_id: &str) -> Result<Offer> {
    let datasets: Vec<&Value> = match catalog.get("dcat:dataset") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        Some(other) => {
            return Err(DsxError::MalformedResponse(format!(
                "dcat:dataset must be an object or array, got {}",
                other
            )))
        }
    };

    if datasets.is_empty() {
        return Err(DsxError::EmptyCatalog);
    }
    info!(datasets = datasets.len(), target = target_asset_id, "Searching catalog");

    let dataset_id = |ds: &Value| ds.get("@id").and_then(Value::as_str).map(str::to_string);

    let Some(dataset) = datasets
        .iter()
        .find(|ds| dataset_id(ds).as_deref() == Some(target_asset_id))
    else {
        return Err(DsxError::AssetNotFound {
            target: target_asset_id.to_string(),
            available: datasets.iter().filter_map(|ds| dataset_id(ds)).collect(),
        });
    };

    let policy = match dataset.get("odrl:hasPolicy") {
        Some(policy @ Value::Object(_)) => policy.clone(),
        // A single-element policy array is accepted as that element
        Some(Value::Array(items)) if items.len() == 1 && items[0].is_object() => items[0].clone(),
        _ => return Err(DsxError::MissingPolicy(target_asset_id.to_string())),
    };
    if policy.get("@id").and_then(Value::as_str).is_none() {
        return Err(DsxError::MissingPolicy(target_asset_id.to_string()));
    }

    let offer = Offer {
        asset_id: target_asset_id.to_string(),
        policy,
    };
    info!(asset_id = %offer.asset_id, policy_id = offer.policy_id(), "Found offer");
    Ok(offer)
}

/// Request the catalog and extract the offer for `target_asset_id`
pub fn discover(ctx: &ProviderContext, target_asset_id: &str) -> Result<Offer> {
    let catalog = request_catalog(ctx)?;
    extract_offer(&catalog, target_asset_id)
}
