/*!
 * Authenticated JSON API calls shared by every phase
 */

use super::{HttpClient, HttpRequest, HttpResponse};
use crate::config::mask_secret;
use crate::error::{DsxError, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

/// JSON-LD namespace of the connector vocabulary
pub const EDC_NAMESPACE: &str = "https://w3id.org/edc/v0.0.1/ns/";

/// JSON-LD namespace of ODRL policies
pub const ODRL_NAMESPACE: &str = "http://www.w3.org/ns/odrl/2/";

/// `@context` carried by management API request bodies
pub fn edc_context() -> Value {
    json!({ "edc": EDC_NAMESPACE })
}

/// HTTP client bound to one API key
#[derive(Clone)]
pub struct ApiClient {
    http: Arc<dyn HttpClient>,
    api_key: String,
    request_timeout: Duration,
    /// Requested `@id` → id the server answered with, for creates seen so far
    created: Arc<Mutex<HashMap<String, String>>>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("api_key", &mask_secret(&self.api_key))
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(
        http: Arc<dyn HttpClient>,
        api_key: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            request_timeout,
            created: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn created(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.created
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Timeout used for one-shot calls
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Send with API key, content type and default timeout applied.
    ///
    /// Any response status is returned as `Ok`.
    pub fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut request = request.with_header("X-Api-Key", self.api_key.as_str());
        if request.header("Content-Type").is_none() {
            request = request.with_header("Content-Type", "application/json");
        }
        if request.timeout.is_none() {
            request.timeout = Some(self.request_timeout);
        }
        debug!(method = %request.method, url = %request.url, "Calling API");
        self.http.execute(&request)
    }

    /// POST a JSON body, requiring a 2xx response with a JSON body
    pub fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        self.send(HttpRequest::post_json(url, body))?
            .require_success(url)?
            .parse()
    }

    /// GET a JSON document, requiring a 2xx response.
    ///
    /// `timeout` overrides the one-shot request timeout (polled fetches pass
    /// the clamped value).
    pub fn get_json(&self, url: &str, timeout: Option<Duration>) -> Result<Value> {
        let mut request = HttpRequest::get(url);
        request.timeout = timeout;
        self.send(request)?.require_success(url)?.parse()
    }

    /// Create a remote resource and return its id.
    ///
    /// The body is given a client-assigned `@id` when it has none. A `409
    /// Conflict` means the resource already exists: it yields the id the
    /// server returned for the earlier create of the same `@id`, or the
    /// requested id when this client never saw that create. Repeating a
    /// create therefore never surfaces a second id. Any other failure is
    /// wrapped in [`DsxError::InitiationFailed`].
    pub fn create(&self, resource: &str, url: &str, mut body: Value) -> Result<String> {
        let requested_id = match body.get("@id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                match body.as_object_mut() {
                    Some(obj) => {
                        obj.insert("@id".to_string(), Value::String(id.clone()));
                    }
                    None => {
                        return Err(DsxError::InitiationFailed {
                            resource: resource.to_string(),
                            source: Box::new(DsxError::MalformedResponse(
                                "request body must be a JSON object".to_string(),
                            )),
                        })
                    }
                }
                id
            }
        };

        let wrap = |e: DsxError| DsxError::InitiationFailed {
            resource: resource.to_string(),
            source: Box::new(e),
        };

        let response = self
            .send(HttpRequest::post_json(url, &body))
            .map_err(&wrap)?;

        if response.status == 409 {
            let id = self
                .created()
                .get(&requested_id)
                .cloned()
                .unwrap_or(requested_id);
            info!(resource, %id, "Already exists, reusing id");
            return Ok(id);
        }

        let response = response.require_success(url).map_err(&wrap)?;
        let id = response
            .parse::<Value>()
            .ok()
            .and_then(|v| v.get("@id").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| requested_id.clone());
        if id != requested_id {
            debug!(
                resource,
                requested = %requested_id,
                assigned = %id,
                "Server assigned its own id"
            );
        }
        self.created().insert(requested_id, id.clone());

        info!(resource, %id, "Created");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::http::{HttpMethod, MockHttpClient};

    const URL: &str = "http://cp:8081/api/management/v3/contractnegotiations";

    fn api(mock: &Arc<MockHttpClient>) -> ApiClient {
        ApiClient::new(mock.clone(), "password", Duration::from_secs(30))
    }

    #[test]
    fn test_headers_and_default_timeout() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond_json(HttpMethod::Get, "http://cp/x", 200, json!([]));

        api(&mock).get_json("http://cp/x", None).unwrap();

        let req = &mock.requests()[0];
        assert_eq!(req.header("X-Api-Key"), Some("password"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_get_json_timeout_override() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond_json(HttpMethod::Get, "http://cp/x", 200, json!({}));

        api(&mock)
            .get_json("http://cp/x", Some(Duration::from_secs(2)))
            .unwrap();
        assert_eq!(mock.requests()[0].timeout, Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_create_assigns_id() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond(HttpMethod::Post, URL, HttpResponse::new(200, ""));

        let id = api(&mock).create("negotiation", URL, json!({"a": 1})).unwrap();

        let sent = mock.requests()[0].json_body().unwrap();
        assert_eq!(sent["@id"], json!(id));
        assert_eq!(id.len(), 36);
    }

    #[test]
    fn test_create_prefers_server_id() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond_json(HttpMethod::Post, URL, 200, json!({"@id": "neg-1"}));

        let id = api(&mock)
            .create("negotiation", URL, json!({"@id": "client-1"}))
            .unwrap();
        assert_eq!(id, "neg-1");
    }

    #[test]
    fn test_create_conflict_reuses_requested_id() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond_json(HttpMethod::Post, URL, 200, json!({"@id": "neg-1"}))
            .respond(HttpMethod::Post, URL, HttpResponse::new(409, "exists"));

        let api = api(&mock);
        let body = json!({"@id": "neg-1"});
        let first = api.create("negotiation", URL, body.clone()).unwrap();
        let second = api.create("negotiation", URL, body).unwrap();

        assert_eq!(first, "neg-1");
        assert_eq!(second, "neg-1");
    }

    #[test]
    fn test_create_conflict_returns_server_assigned_id() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond_json(HttpMethod::Post, URL, 200, json!({"@id": "server-neg-1"}))
            .respond(HttpMethod::Post, URL, HttpResponse::new(409, "exists"));

        let api = api(&mock);
        let body = json!({"@id": "req-1"});
        let first = api.create("negotiation", URL, body.clone()).unwrap();
        let second = api.clone().create("negotiation", URL, body).unwrap();

        assert_eq!(first, "server-neg-1");
        assert_eq!(second, "server-neg-1");
    }

    #[test]
    fn test_create_conflict_without_prior_create() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond(HttpMethod::Post, URL, HttpResponse::new(409, "exists"));

        let id = api(&mock)
            .create("negotiation", URL, json!({"@id": "req-1"}))
            .unwrap();
        assert_eq!(id, "req-1");
    }

    #[test]
    fn test_create_rejected() {
        let mock = Arc::new(MockHttpClient::new());
        mock.respond(HttpMethod::Post, URL, HttpResponse::new(400, "invalid policy"));

        let err = api(&mock).create("negotiation", URL, json!({})).unwrap_err();
        assert!(matches!(err, DsxError::InitiationFailed { .. }));
        assert_eq!(err.kind(), ErrorKind::UnexpectedStatus);
        assert!(err.to_string().contains("invalid policy"));
    }

    #[test]
    fn test_create_transport_failure() {
        let mock = Arc::new(MockHttpClient::new());
        mock.fail(HttpMethod::Post, URL, "connection refused");

        let err = api(&mock).create("transfer", URL, json!({})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_debug_masks_key() {
        let mock = Arc::new(MockHttpClient::new());
        let rendered = format!("{:?}", api(&mock));
        assert!(rendered.contains("**********word"));
        assert!(!rendered.contains("\"password\""));
    }
}
