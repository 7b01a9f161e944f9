/*!
 * Integration tests for end-to-end transactions
 *
 * Each test scripts a provider on MockHttpClient and drives the
 * orchestrator through it, verifying:
 * - The full phase chain and the data it returns
 * - Terminal failures and where the run stops
 * - Polling until a negotiation settles
 * - Idempotent creates on 409 Conflict
 * - The prerequisite gate
 */

use dsx::{
    config::DsxConfig,
    error::{DsxError, ErrorKind},
    http::{HttpMethod, HttpResponse, MockHttpClient},
    orchestrator::{Phase, TransactionOrchestrator},
};
use dsx_core_poll::{PollConfig, Poller};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const DATA_URL: &str = "http://host.docker.internal:11002/api/public";

struct Provider {
    mock: Arc<MockHttpClient>,
    config: DsxConfig,
}

impl Provider {
    fn new() -> Self {
        Self {
            mock: Arc::new(MockHttpClient::new()),
            config: DsxConfig::default(),
        }
    }

    fn mgmt(&self, path: &str) -> String {
        format!("{}{}", self.config.provider.management_url(), path)
    }

    fn catalog(&self, assets: &[&str]) -> &Self {
        let datasets: Vec<_> = assets
            .iter()
            .map(|id| {
                json!({
                    "@id": id,
                    "odrl:hasPolicy": { "@id": format!("offer-{}", id), "odrl:permission": [] }
                })
            })
            .collect();
        self.mock.respond_json(
            HttpMethod::Post,
            &self.mgmt("/v3/catalog/request"),
            200,
            json!({ "@type": "dcat:Catalog", "dcat:dataset": datasets }),
        );
        self
    }

    fn negotiation(&self, id: &str, states: &[(&str, Option<&str>)]) -> &Self {
        self.mock.respond_json(
            HttpMethod::Post,
            &self.mgmt("/v3/contractnegotiations"),
            200,
            json!({ "@id": id }),
        );
        let url = self.mgmt(&format!("/v3/contractnegotiations/{}", id));
        for (state, agreement) in states {
            let mut doc = json!({ "@id": id, "state": state });
            if let Some(agreement) = agreement {
                doc["contractAgreementId"] = json!(agreement);
            }
            self.mock.respond_json(HttpMethod::Get, &url, 200, doc);
        }
        self
    }

    fn transfer(&self, id: &str, states: &[&str]) -> &Self {
        self.mock.respond_json(
            HttpMethod::Post,
            &self.mgmt("/v3/transferprocesses"),
            200,
            json!({ "@id": id }),
        );
        let url = self.mgmt(&format!("/v3/transferprocesses/{}", id));
        for state in states {
            self.mock
                .respond_json(HttpMethod::Get, &url, 200, json!({ "@id": id, "state": state }));
        }
        self
    }

    fn edr(&self, transfer_id: &str) -> &Self {
        self.mock.respond_json(
            HttpMethod::Get,
            &self.mgmt(&format!("/v1/edrs?transferProcessId={}", transfer_id)),
            200,
            json!([{
                "edc:endpoint": DATA_URL,
                "edc:authCode": "token-1",
                "edc:authKey": "Authorization"
            }]),
        );
        self
    }

    fn data(&self, status: u16, body: &str) -> &Self {
        self.mock
            .respond(HttpMethod::Get, DATA_URL, HttpResponse::new(status, body));
        self
    }

    fn seeded(&self, dataplane_state: &str) -> &Self {
        for (_, url) in self.config.provider.health_endpoints() {
            self.mock
                .respond(HttpMethod::Get, &url, HttpResponse::new(200, "{}"));
        }
        for path in [
            "/v3/assets/request",
            "/v3/policydefinitions/request",
            "/v3/contractdefinitions/request",
        ] {
            self.mock
                .respond_json(HttpMethod::Post, &self.mgmt(path), 200, json!([{ "@id": "x" }]));
        }
        self.mock.respond_json(
            HttpMethod::Get,
            &self.mgmt("/v3/dataplanes"),
            200,
            json!([{ "@id": "dp-1", "state": dataplane_state }]),
        );
        self
    }

    fn orchestrator(&self) -> TransactionOrchestrator {
        TransactionOrchestrator::new(&self.config, self.mock.clone())
            .unwrap()
            .with_pollers(instant(60), instant(60))
            .skip_prerequisites(true)
    }
}

fn instant(max_attempts: u32) -> Poller {
    Poller::new(PollConfig::new(max_attempts, Duration::from_secs(2)).unwrap()).with_sleep(|_| {})
}

#[test]
fn test_full_transaction() {
    let provider = Provider::new();
    provider
        .catalog(&["asset-1", "asset-2"])
        .negotiation("neg-1", &[("FINALIZED", Some("agr-1"))])
        .transfer("t-1", &["STARTED"])
        .edr("t-1")
        .data(200, r#"[{"id":1}]"#);

    let report = provider.orchestrator().run("asset-1").unwrap();
    assert_eq!(report.asset_id, "asset-1");
    assert_eq!(report.negotiation_id, "neg-1");
    assert_eq!(report.agreement_id, "agr-1");
    assert_eq!(report.transfer_id, "t-1");
    assert_eq!(report.data.status, 200);
    assert_eq!(report.data.preview, json!([{ "id": 1 }]));
    assert!(report.prerequisites.is_none());
    assert!(report.completed_at >= report.started_at);

    let mock = &provider.mock;
    let negotiation = mock
        .requests()
        .into_iter()
        .find(|r| r.method == HttpMethod::Post && r.url.ends_with("/v3/contractnegotiations"))
        .unwrap();
    let body = negotiation.json_body().unwrap();
    assert_eq!(body["policy"]["@id"], "offer-asset-1");
    assert_eq!(body["policy"]["odrl:target"]["@id"], "asset-1");

    let transfer = mock
        .requests()
        .into_iter()
        .find(|r| r.method == HttpMethod::Post && r.url.ends_with("/v3/transferprocesses"))
        .unwrap();
    assert_eq!(transfer.json_body().unwrap()["contractId"], "agr-1");

    let pull = mock
        .requests()
        .into_iter()
        .find(|r| r.url == DATA_URL)
        .unwrap();
    assert_eq!(pull.header("Authorization"), Some("token-1"));
    assert_eq!(pull.header("X-Api-Key"), None);
}

#[test]
fn test_negotiation_polled_until_finalized() {
    let provider = Provider::new();
    provider
        .catalog(&["asset-1"])
        .negotiation(
            "neg-1",
            &[("REQUESTED", None), ("AGREED", None), ("FINALIZED", Some("agr-1"))],
        )
        .transfer("t-1", &["REQUESTED", "STARTED"])
        .edr("t-1")
        .data(200, r#"{"ok":true}"#);

    let sleeps = Arc::new(Mutex::new(Vec::new()));
    let recorded = sleeps.clone();
    let negotiation_poller = Poller::new(PollConfig::new(60, Duration::from_secs(2)).unwrap())
        .with_sleep(move |d| recorded.lock().unwrap().push(d));

    let report = provider
        .orchestrator()
        .with_pollers(negotiation_poller, instant(60))
        .run("asset-1")
        .unwrap();
    assert_eq!(report.agreement_id, "agr-1");

    let mock = &provider.mock;
    assert_eq!(
        mock.calls(HttpMethod::Get, &provider.mgmt("/v3/contractnegotiations/neg-1")),
        3
    );
    assert_eq!(
        mock.calls(HttpMethod::Get, &provider.mgmt("/v3/transferprocesses/t-1")),
        2
    );
    assert_eq!(*sleeps.lock().unwrap(), vec![Duration::from_secs(2); 2]);

    let poll = mock
        .requests()
        .into_iter()
        .find(|r| r.url.ends_with("/v3/contractnegotiations/neg-1"))
        .unwrap();
    assert_eq!(poll.timeout, Some(Duration::from_secs(2)));
}

#[test]
fn test_transfer_terminated_stops_before_data_access() {
    let provider = Provider::new();
    provider
        .catalog(&["asset-1"])
        .negotiation("neg-1", &[("FINALIZED", Some("agr-1"))])
        .transfer("t-1", &["REQUESTED", "TERMINATED"]);

    let err = provider.orchestrator().run("asset-1").unwrap_err();
    assert_eq!(err.phase, Phase::Transfer);
    assert_eq!(err.kind(), ErrorKind::ProtocolTerminalFailure);
    assert_eq!(err.last_state(), Some("TERMINATED"));

    assert_eq!(provider.mock.calls_with_prefix(&provider.mgmt("/v1/edrs")), 0);
    assert_eq!(provider.mock.calls_with_prefix(DATA_URL), 0);

    let report = err.report();
    assert_eq!(report.trail.transfer_id.as_deref(), Some("t-1"));
    assert_eq!(
        report.left_in_place,
        vec![
            "contract negotiation neg-1",
            "contract agreement agr-1",
            "transfer process t-1"
        ]
    );
}

#[test]
fn test_negotiation_timeout_reports_last_state() {
    let provider = Provider::new();
    provider
        .catalog(&["asset-1"])
        .negotiation("neg-1", &[("REQUESTED", None)]);

    let err = provider
        .orchestrator()
        .with_pollers(instant(4), instant(4))
        .run("asset-1")
        .unwrap_err();
    assert_eq!(err.phase, Phase::Negotiation);
    assert_eq!(err.kind(), ErrorKind::PollTimeout);
    assert_eq!(err.last_state(), Some("REQUESTED"));
    assert_eq!(
        provider
            .mock
            .calls(HttpMethod::Get, &provider.mgmt("/v3/contractnegotiations/neg-1")),
        4
    );
    assert_eq!(provider.mock.calls_with_prefix(&provider.mgmt("/v3/transferprocesses")), 0);
}

#[test]
fn test_conflict_reuses_requested_id() {
    let provider = Provider::new();
    provider.catalog(&["asset-1"]);
    provider.mock.respond(
        HttpMethod::Post,
        &provider.mgmt("/v3/contractnegotiations"),
        HttpResponse::new(409, "already exists"),
    );

    let ctx = provider.orchestrator().provider().clone();
    let offer = dsx::phases::catalog::discover(&ctx, "asset-1").unwrap();

    let first = dsx::phases::negotiation::initiate_with_id(&ctx, &offer, "neg-fixed").unwrap();
    let second = dsx::phases::negotiation::initiate_with_id(&ctx, &offer, "neg-fixed").unwrap();
    assert_eq!(first, "neg-fixed");
    assert_eq!(second, "neg-fixed");
}

#[test]
fn test_conflict_after_server_assigned_id() {
    let provider = Provider::new();
    provider.catalog(&["asset-1"]);
    let url = provider.mgmt("/v3/contractnegotiations");
    provider
        .mock
        .respond_json(HttpMethod::Post, &url, 200, json!({ "@id": "server-neg-1" }))
        .respond(HttpMethod::Post, &url, HttpResponse::new(409, "already exists"));

    let ctx = provider.orchestrator().provider().clone();
    let offer = dsx::phases::catalog::discover(&ctx, "asset-1").unwrap();

    let first = dsx::phases::negotiation::initiate_with_id(&ctx, &offer, "req-1").unwrap();
    let second = dsx::phases::negotiation::initiate_with_id(&ctx, &offer, "req-1").unwrap();
    assert_eq!(first, "server-neg-1");
    assert_eq!(second, first);
}

#[test]
fn test_asset_not_in_catalog() {
    let provider = Provider::new();
    provider.catalog(&["asset-1", "asset-2"]);

    let err = provider.orchestrator().run("asset-9").unwrap_err();
    assert_eq!(err.phase, Phase::Catalog);
    assert_eq!(err.kind(), ErrorKind::NotFound);
    match err.error {
        DsxError::AssetNotFound { ref available, .. } => {
            assert_eq!(available, &vec!["asset-1".to_string(), "asset-2".to_string()]);
        }
        ref other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.report().left_in_place.is_empty());
    assert_eq!(
        provider
            .mock
            .calls_with_prefix(&provider.mgmt("/v3/contractnegotiations")),
        0
    );
}

#[test]
fn test_data_plane_rejection() {
    let provider = Provider::new();
    provider
        .catalog(&["asset-1"])
        .negotiation("neg-1", &[("FINALIZED", Some("agr-1"))])
        .transfer("t-1", &["STARTED"])
        .edr("t-1")
        .data(403, "forbidden");

    let err = provider.orchestrator().run("asset-1").unwrap_err();
    assert_eq!(err.phase, Phase::DataAccess);
    assert!(matches!(
        err.error,
        DsxError::DataAccess { status: 403, ref cause } if cause == "agreement validation failed"
    ));
}

#[test]
fn test_catalog_unreachable() {
    let provider = Provider::new();
    provider.mock.fail(
        HttpMethod::Post,
        &provider.mgmt("/v3/catalog/request"),
        "connection refused",
    );

    let err = provider.orchestrator().run("asset-1").unwrap_err();
    assert_eq!(err.phase, Phase::Catalog);
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[test]
fn test_prerequisite_gate_blocks_transaction() {
    let provider = Provider::new();
    provider.seeded("REGISTERED").catalog(&["asset-1"]);

    let err = provider
        .orchestrator()
        .skip_prerequisites(false)
        .run("asset-1")
        .unwrap_err();
    assert_eq!(err.phase, Phase::Prerequisites);
    assert_eq!(err.kind(), ErrorKind::Prerequisite);
    assert!(err.to_string().contains("Dataplane Available"));
    assert_eq!(
        provider.mock.calls_with_prefix(&provider.mgmt("/v3/catalog")),
        0
    );
}

#[test]
fn test_prerequisites_included_in_report() {
    let provider = Provider::new();
    provider
        .seeded("AVAILABLE")
        .catalog(&["asset-1"])
        .negotiation("neg-1", &[("FINALIZED", Some("agr-1"))])
        .transfer("t-1", &["STARTED"])
        .edr("t-1")
        .data(200, "plain text body");

    let report = provider
        .orchestrator()
        .skip_prerequisites(false)
        .run("asset-1")
        .unwrap();
    let prerequisites = report.prerequisites.unwrap();
    assert!(prerequisites.all_passed());
    assert_eq!(prerequisites.checks.len(), 7);
    assert_eq!(report.data.preview, json!("plain text body"));
}
