//! `dsx check`: run the prerequisite checks only

use crate::cli_style::{check_table, print_success, section_header};
use crate::config::DsxConfig;
use crate::error::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::http::HttpClient;
use crate::output::OutputWriter;
use crate::prerequisites::PrerequisiteChecker;
use dsx_core_poll::Poller;
use std::sync::Arc;

const COMMAND: &str = "check";

pub fn run(
    config: &DsxConfig,
    http: Arc<dyn HttpClient>,
    out: &OutputWriter,
) -> crate::error::Result<i32> {
    let mut checker = PrerequisiteChecker::new(config, http);
    if config.transaction.wait_for_health {
        checker = checker.with_health_wait(Poller::new(config.polling.health.to_poll_config()?));
    }

    let report = checker.run();
    let passed = report.all_passed();

    if out.is_json() {
        out.json_result(COMMAND, passed, &report);
    } else {
        section_header("Prerequisites");
        let rows: Vec<(&str, bool, &str)> = report
            .checks
            .iter()
            .map(|c| (c.name.as_str(), c.passed, c.detail.as_str()))
            .collect();
        println!("{}", check_table(&rows));

        match report.gate() {
            Ok(()) => print_success("All prerequisite checks passed"),
            Err(e) => crate::cli_style::print_error(
                &e.to_string(),
                Some("Start the provider, seed it, then request credentials"),
            ),
        }
    }

    Ok(if passed { EXIT_SUCCESS } else { EXIT_FAILURE })
}
