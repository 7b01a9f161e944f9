//! `dsx config`: print the resolved configuration with secrets masked

use crate::cli_style::{section_header, stats_table};
use crate::config::DsxConfig;
use crate::error::{DsxError, Result, EXIT_SUCCESS};
use crate::output::OutputWriter;

const COMMAND: &str = "config";

/// Derived endpoints and identities shown alongside the configuration
#[derive(Debug, serde::Serialize)]
pub struct ResolvedEndpoints {
    pub management_url: String,
    pub protocol_url: String,
    pub identity_url: String,
    pub provider_did: String,
    pub issuer_did: String,
}

impl ResolvedEndpoints {
    pub fn from_config(config: &DsxConfig) -> Self {
        Self {
            management_url: config.provider.management_url(),
            protocol_url: config.provider.protocol_url(),
            identity_url: config.identity_url(),
            provider_did: config.provider.did(),
            issuer_did: config.issuer.did(),
        }
    }
}

#[derive(Debug, serde::Serialize)]
struct ConfigView<'a> {
    endpoints: ResolvedEndpoints,
    config: &'a DsxConfig,
}

pub fn run(config: &DsxConfig, out: &OutputWriter) -> Result<i32> {
    let masked = config.masked();
    let endpoints = ResolvedEndpoints::from_config(config);

    if out.is_json() {
        out.json_result(
            COMMAND,
            true,
            &ConfigView {
                endpoints,
                config: &masked,
            },
        );
        return Ok(EXIT_SUCCESS);
    }

    section_header("Endpoints");
    println!(
        "{}",
        stats_table(&[
            ("Management API", endpoints.management_url),
            ("DSP endpoint", endpoints.protocol_url),
            ("Identity API", endpoints.identity_url),
            ("Provider DID", endpoints.provider_did),
            ("Issuer DID", endpoints.issuer_did),
        ])
    );

    section_header("Configuration");
    let rendered = toml::to_string_pretty(&masked).map_err(|e| DsxError::Config(e.to_string()))?;
    println!("{}", rendered);
    Ok(EXIT_SUCCESS)
}
