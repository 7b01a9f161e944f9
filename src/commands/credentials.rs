//! `dsx request-credentials`: request verifiable credentials from the issuer

use crate::cli_style::{header_box, print_success, stats_table};
use crate::config::DsxConfig;
use crate::credentials::{CredentialOutcome, CredentialRequester};
use crate::error::{Result, EXIT_FAILURE, EXIT_SUCCESS};
use crate::http::HttpClient;
use crate::output::OutputWriter;
use std::sync::Arc;

const COMMAND: &str = "request-credentials";

/// Exit code for an outcome
pub fn exit_code(outcome: &CredentialOutcome, allow_indeterminate: bool) -> i32 {
    match outcome {
        CredentialOutcome::Issued { .. } => EXIT_SUCCESS,
        CredentialOutcome::Indeterminate { .. } if allow_indeterminate => EXIT_SUCCESS,
        CredentialOutcome::Indeterminate { .. } => EXIT_FAILURE,
    }
}

pub fn run(
    config: &DsxConfig,
    http: Arc<dyn HttpClient>,
    types: &[String],
    allow_indeterminate: bool,
    out: &OutputWriter,
) -> Result<i32> {
    let specs = if types.is_empty() {
        config.credentials.requested.clone()
    } else {
        config.credentials.select(types)?
    };
    let requester = CredentialRequester::new(config, http)?;

    if !out.is_json() {
        header_box("Credential Request", Some(&config.identity_url()));
        println!();
        print!(
            "{}",
            stats_table(&[
                ("Participant DID", config.provider.did()),
                ("Issuer DID", config.issuer.did()),
                (
                    "Credentials",
                    specs
                        .iter()
                        .map(|s| s.credential_type.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                ),
            ])
        );
        println!();
    }

    match requester.request_credentials(&specs) {
        Ok(outcome) => {
            let code = exit_code(&outcome, allow_indeterminate);
            if out.is_json() {
                out.json_result(COMMAND, code == EXIT_SUCCESS, &outcome);
            } else {
                match outcome {
                    CredentialOutcome::Issued { ref status_url } => {
                        print_success(&format!("Credentials issued ({})", status_url));
                    }
                    CredentialOutcome::Indeterminate { ref reason } if code == EXIT_SUCCESS => {
                        out.warning(&format!("Issuance not observed: {}", reason));
                    }
                    CredentialOutcome::Indeterminate { ref reason } => {
                        crate::cli_style::print_error(
                            &format!("Issuance not observed: {}", reason),
                            Some("Pass --allow-indeterminate to accept an unobserved request"),
                        );
                    }
                }
            }
            Ok(code)
        }
        Err(err) => {
            let mut message = format!("[{}] {}", err.kind(), err);
            if let Some(state) = err.last_state().filter(|s| !message.contains(*s)) {
                message.push_str(&format!(" (last state: {})", state));
            }
            out.error(COMMAND, &message);
            Ok(err.exit_code())
        }
    }
}
