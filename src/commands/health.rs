//! `dsx wait-healthy`: block until every provider component reports healthy

use crate::cli_style::{format_duration, print_success, Icons, Theme};
use crate::config::{DsxConfig, PollSettings};
use crate::error::{Result, EXIT_SUCCESS};
use crate::http::HttpClient;
use crate::output::OutputWriter;
use crate::prerequisites::wait_for_health;
use dsx_core_poll::Poller;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

const COMMAND: &str = "wait-healthy";

#[derive(Debug, Serialize)]
struct ComponentHealth<'a> {
    component: &'a str,
    url: &'a str,
    healthy: bool,
}

pub fn run(
    config: &DsxConfig,
    http: Arc<dyn HttpClient>,
    max_attempts: Option<u32>,
    interval_secs: Option<u64>,
    out: &OutputWriter,
) -> Result<i32> {
    let defaults = config.polling.health;
    let settings = PollSettings::new(
        max_attempts.unwrap_or(defaults.max_attempts),
        interval_secs.unwrap_or(defaults.interval_secs),
    );
    let poller = Poller::new(settings.to_poll_config()?);
    let started = Instant::now();

    for (component, url) in config.provider.health_endpoints() {
        out.info(&format!("Waiting for {} ({})", component, url));

        let result = wait_for_health(
            http.as_ref(),
            &component,
            &url,
            &poller,
            config.http.request_timeout(),
        );
        let healthy = result.is_ok();
        if out.is_json() {
            out.json_result(
                COMMAND,
                healthy,
                &ComponentHealth {
                    component: &component,
                    url: &url,
                    healthy,
                },
            );
        }

        if let Err(err) = result {
            if !out.is_json() {
                out.error(COMMAND, &err.to_string());
            }
            return Ok(err.exit_code());
        }
        if !out.is_json() {
            println!("{} {} is healthy", Theme::success(Icons::SUCCESS), component);
        }
    }

    if !out.is_json() {
        print_success(&format!(
            "All components healthy after {}",
            format_duration(started.elapsed().as_secs_f64())
        ));
    }
    Ok(EXIT_SUCCESS)
}
