//! `dsx e2e`: run one end-to-end transaction

use crate::cli_style::{
    check_table, format_bytes, format_duration, header_box, phase_table, print_error,
    print_success, section_header, stats_table, StepStatus,
};
use crate::config::DsxConfig;
use crate::error::{ErrorKind, EXIT_FAILURE, EXIT_SUCCESS};
use crate::http::HttpClient;
use crate::orchestrator::{Phase, PhaseError, TransactionOrchestrator, TransactionReport};
use crate::output::OutputWriter;
use crate::prerequisites::PrerequisiteReport;
use std::sync::Arc;

const COMMAND: &str = "e2e";

const PHASES: [Phase; 5] = [
    Phase::Prerequisites,
    Phase::Catalog,
    Phase::Negotiation,
    Phase::Transfer,
    Phase::DataAccess,
];

/// Hint printed under a failure
pub fn suggestion(err: &PhaseError) -> Option<&'static str> {
    match (err.phase, err.kind()) {
        (_, ErrorKind::Transport) => {
            Some("Is the provider running? Try `dsx wait-healthy` before rerunning")
        }
        (_, ErrorKind::Prerequisite) => {
            Some("Seed the provider and request credentials, then rerun `dsx check`")
        }
        (Phase::Negotiation, ErrorKind::ProtocolTerminalFailure) => Some(
            "Policy evaluation, credentials or DID resolution failed; check the control plane logs",
        ),
        (_, ErrorKind::PollTimeout) => {
            Some("Increase the polling budget in the configuration or check the provider logs")
        }
        (Phase::Catalog, ErrorKind::NotFound) => {
            Some("Pick an available asset with --asset-id or seed the provider")
        }
        _ => None,
    }
}

pub fn run(
    config: &DsxConfig,
    http: Arc<dyn HttpClient>,
    asset_id: Option<String>,
    skip_prerequisites: bool,
    out: &OutputWriter,
) -> crate::error::Result<i32> {
    let target = asset_id.unwrap_or_else(|| config.transaction.target_asset_id.clone());
    let skip = skip_prerequisites || config.transaction.skip_prerequisites;
    let orchestrator = TransactionOrchestrator::new(config, http)?.skip_prerequisites(skip);

    if !out.is_json() {
        header_box("Dataspace Transaction", Some(&config.provider.management_url()));
        println!();
        print!(
            "{}",
            stats_table(&[
                ("Target asset", target.clone()),
                ("Provider DID", config.provider.did()),
                ("DSP endpoint", config.provider.protocol_url()),
            ])
        );
        println!();
    }
    if skip {
        out.warning("Skipping prerequisite verification (not recommended)");
    }

    match orchestrator.run(&target) {
        Ok(report) => {
            if out.is_json() {
                out.json_result(COMMAND, true, &report);
            } else {
                render_success(&report, skip);
            }
            Ok(EXIT_SUCCESS)
        }
        Err(err) => {
            if out.is_json() {
                out.json_result(COMMAND, false, &err.report());
            } else {
                render_failure(&err, skip);
            }
            Ok(err.exit_code().max(EXIT_FAILURE))
        }
    }
}

fn render_prerequisites(report: &PrerequisiteReport) {
    section_header("Prerequisites");
    let rows: Vec<(&str, bool, &str)> = report
        .checks
        .iter()
        .map(|c| (c.name.as_str(), c.passed, c.detail.as_str()))
        .collect();
    println!("{}", check_table(&rows));
}

fn render_success(report: &TransactionReport, skipped: bool) {
    if let Some(ref prerequisites) = report.prerequisites {
        render_prerequisites(prerequisites);
    }

    section_header("Phases");
    let rows = vec![
        (
            "prerequisites",
            if skipped { StepStatus::Skipped } else { StepStatus::Done },
            String::new(),
        ),
        ("catalog", StepStatus::Done, format!("asset {}", report.asset_id)),
        (
            "negotiation",
            StepStatus::Done,
            format!("{} → agreement {}", report.negotiation_id, report.agreement_id),
        ),
        ("transfer", StepStatus::Done, format!("{} STARTED", report.transfer_id)),
        (
            "data access",
            StepStatus::Done,
            format!("HTTP {}, {}", report.data.status, format_bytes(report.data.bytes as u64)),
        ),
    ];
    println!("{}", phase_table(&rows));

    section_header("Data preview");
    let preview = serde_json::to_string_pretty(&report.data.preview)
        .unwrap_or_else(|_| report.data.preview.to_string());
    println!("{}", preview);
    if report.data.remaining_items > 0 {
        println!("... and {} more items", report.data.remaining_items);
    }
    println!();

    print_success(&format!(
        "Transaction completed in {}",
        format_duration(report.elapsed_secs())
    ));
}

fn render_failure(err: &PhaseError, skipped: bool) {
    let failed_at = PHASES.iter().position(|p| *p == err.phase).unwrap_or(0);
    let trail = &err.trail;

    let rows: Vec<(&str, StepStatus, String)> = PHASES
        .iter()
        .enumerate()
        .map(|(i, phase)| {
            let status = if *phase == Phase::Prerequisites && skipped {
                StepStatus::Skipped
            } else if i < failed_at {
                StepStatus::Done
            } else if i == failed_at {
                StepStatus::Failed
            } else {
                StepStatus::NotReached
            };
            let detail = match phase {
                Phase::Catalog => trail.asset_id.clone(),
                Phase::Negotiation => trail.negotiation_id.clone(),
                Phase::Transfer => trail.transfer_id.clone(),
                _ => None,
            }
            .unwrap_or_default();
            (label(*phase), status, detail)
        })
        .collect();

    section_header("Phases");
    println!("{}", phase_table(&rows));

    let report = err.report();
    let mut message = format!("[{}] {}", report.kind, err);
    if let Some(state) = report.last_state.filter(|s| !message.contains(s.as_str())) {
        message.push_str(&format!(" (last state: {})", state));
    }
    print_error(&message, suggestion(err));

    if !report.left_in_place.is_empty() {
        section_header("Remote resources left in place");
        for resource in &report.left_in_place {
            println!("  {} {}", crate::cli_style::Icons::BULLET, resource);
        }
        println!();
    }
}

fn label(phase: Phase) -> &'static str {
    match phase {
        Phase::Prerequisites => "prerequisites",
        Phase::Catalog => "catalog",
        Phase::Negotiation => "negotiation",
        Phase::Transfer => "transfer",
        Phase::DataAccess => "data access",
    }
}
