/*!
 * Prerequisite verification before a transaction
 *
 * Every check runs and is recorded independently; the gate fails when any
 * check fails. Checks never raise: each failure is captured in its
 * [`CheckResult`].
 */

use crate::config::DsxConfig;
use crate::error::{DsxError, Result};
use crate::http::api::edc_context;
use crate::http::{ApiClient, HttpClient, HttpRequest};
use dsx_core_poll::{Classification, Poller};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span};

/// Page size of the management queries
const QUERY_LIMIT: u32 = 50;

/// Outcome of one prerequisite check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        info!(check = name, %detail, "Check passed");
        Self {
            name: name.to_string(),
            passed: true,
            detail,
        }
    }

    fn fail(name: &str, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        error!(check = name, %detail, "Check failed");
        Self {
            name: name.to_string(),
            passed: false,
            detail,
        }
    }
}

/// All checks of one verification run, in execution order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrerequisiteReport {
    pub checks: Vec<CheckResult>,
}

impl PrerequisiteReport {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    /// Names of the failed checks
    pub fn failed(&self) -> Vec<String> {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| c.name.clone())
            .collect()
    }

    /// `Err(Prerequisites)` unless every check passed
    pub fn gate(&self) -> Result<()> {
        if self.all_passed() {
            Ok(())
        } else {
            Err(DsxError::Prerequisites {
                failed: self.failed(),
            })
        }
    }
}

/// Poll a health endpoint until it answers 200.
///
/// Transport errors and other statuses count as not ready yet.
pub fn wait_for_health(
    http: &dyn HttpClient,
    component: &str,
    url: &str,
    poller: &Poller,
    request_timeout: Duration,
) -> Result<()> {
    let request =
        HttpRequest::get(url).with_timeout(poller.config().fetch_timeout(request_timeout));
    let resource = format!("{} health", component);

    let outcome = poller.poll(
        &resource,
        || -> Result<Option<u16>> {
            match http.execute(&request) {
                Ok(response) => Ok(Some(response.status)),
                Err(e) => {
                    debug!(component, error = %e, "Health endpoint unreachable");
                    Ok(None)
                }
            }
        },
        |status| match status {
            Some(200) => Classification::Success(()),
            Some(other) => Classification::pending(format!("HTTP {}", other)),
            None => Classification::pending("unreachable"),
        },
    );

    crate::phases::settle(&resource, outcome, |reason| reason.to_string())?;
    info!(component, "Healthy");
    Ok(())
}

/// Runs the prerequisite checks against one provider
pub struct PrerequisiteChecker {
    api: ApiClient,
    http: Arc<dyn HttpClient>,
    management_url: String,
    health_endpoints: Vec<(String, String)>,
    health_wait: Option<Poller>,
}

impl PrerequisiteChecker {
    pub fn new(config: &DsxConfig, http: Arc<dyn HttpClient>) -> Self {
        Self {
            api: ApiClient::new(
                http.clone(),
                config.provider.management_api_key.clone(),
                config.http.request_timeout(),
            ),
            http,
            management_url: config.provider.management_url(),
            health_endpoints: config.provider.health_endpoints(),
            health_wait: None,
        }
    }

    /// Wait for each component's health with `poller` instead of checking once
    pub fn with_health_wait(mut self, poller: Poller) -> Self {
        self.health_wait = Some(poller);
        self
    }

    pub fn health_endpoints(&self) -> &[(String, String)] {
        &self.health_endpoints
    }

    /// Health of one component
    pub fn check_health(&self, component: &str, url: &str) -> CheckResult {
        let name = format!("{} Health", component);

        if let Some(ref poller) = self.health_wait {
            return match wait_for_health(
                self.http.as_ref(),
                component,
                url,
                poller,
                self.api.request_timeout(),
            ) {
                Ok(()) => CheckResult::pass(&name, "healthy"),
                Err(e) => CheckResult::fail(&name, e.to_string()),
            };
        }

        let request = HttpRequest::get(url).with_timeout(self.api.request_timeout());
        match self.http.execute(&request) {
            Ok(response) if response.status == 200 => CheckResult::pass(&name, "healthy"),
            Ok(response) => CheckResult::fail(&name, format!("HTTP {}", response.status)),
            Err(e) => CheckResult::fail(&name, e.to_string()),
        }
    }

    /// A management query that must return a non-empty list
    fn check_query(&self, name: &str, path: &str, noun: &str) -> CheckResult {
        let url = format!("{}{}", self.management_url, path);
        let body = json!({
            "@context": edc_context(),
            "@type": "QuerySpec",
            "limit": QUERY_LIMIT,
        });

        match self.api.post_json(&url, &body) {
            Ok(Value::Array(items)) if !items.is_empty() => {
                CheckResult::pass(name, format!("{} {} found", items.len(), noun))
            }
            Ok(Value::Array(_)) => CheckResult::fail(name, format!("no {} found", noun)),
            Ok(other) => CheckResult::fail(name, format!("expected a list, got {}", other)),
            Err(e) => CheckResult::fail(name, e.to_string()),
        }
    }

    pub fn check_assets(&self) -> CheckResult {
        self.check_query("Assets Seeded", "/v3/assets/request", "assets")
    }

    pub fn check_policies(&self) -> CheckResult {
        self.check_query(
            "Policies Configured",
            "/v3/policydefinitions/request",
            "policy definitions",
        )
    }

    pub fn check_contract_definitions(&self) -> CheckResult {
        self.check_query(
            "Contract Definitions Configured",
            "/v3/contractdefinitions/request",
            "contract definitions",
        )
    }

    /// First registered data plane must be AVAILABLE
    pub fn check_dataplane(&self) -> CheckResult {
        const NAME: &str = "Dataplane Available";
        let url = format!("{}/v3/dataplanes", self.management_url);

        match self.api.get_json(&url, None) {
            Ok(Value::Array(items)) => match items.first() {
                None => CheckResult::fail(NAME, "no dataplane registered"),
                Some(first) => {
                    let state = first
                        .get("state")
                        .and_then(Value::as_str)
                        .unwrap_or("UNKNOWN");
                    if state == "AVAILABLE" {
                        CheckResult::pass(NAME, "dataplane AVAILABLE")
                    } else {
                        CheckResult::fail(
                            NAME,
                            format!("dataplane state is {}, expected AVAILABLE", state),
                        )
                    }
                }
            },
            Ok(other) => CheckResult::fail(NAME, format!("expected a list, got {}", other)),
            Err(e) => CheckResult::fail(NAME, e.to_string()),
        }
    }

    /// Run every check
    pub fn run(&self) -> PrerequisiteReport {
        let span = info_span!("prerequisites");
        let _enter = span.enter();

        let mut checks: Vec<CheckResult> = self
            .health_endpoints
            .iter()
            .map(|(component, url)| self.check_health(component, url))
            .collect();
        checks.push(self.check_assets());
        checks.push(self.check_policies());
        checks.push(self.check_contract_definitions());
        checks.push(self.check_dataplane());

        let report = PrerequisiteReport { checks };
        if report.all_passed() {
            info!("All prerequisite checks passed");
        } else {
            error!(failed = ?report.failed(), "Prerequisite checks failed");
        }
        report
    }
}
