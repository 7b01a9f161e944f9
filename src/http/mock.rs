/*!
 * Scripted in-memory HTTP client
 *
 * Responses are queued per method and URL (query string included). Each call
 * pops the next queued reply; the last reply of a queue is sticky and keeps
 * answering once the queue is down to it. Every request is recorded.
 */

use super::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use crate::error::{DsxError, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Reply {
    Response(HttpResponse),
    TransportError(String),
}

/// Test double for [`HttpClient`]
#[derive(Debug, Default)]
pub struct MockHttpClient {
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<Reply>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: HttpMethod, url: &str, reply: Reply) {
        lock(&self.routes)
            .entry((method, url.to_string()))
            .or_default()
            .push_back(reply);
    }

    /// Queue a response
    pub fn respond(&self, method: HttpMethod, url: &str, response: HttpResponse) -> &Self {
        self.push(method, url, Reply::Response(response));
        self
    }

    /// Queue a JSON response
    pub fn respond_json(
        &self,
        method: HttpMethod,
        url: &str,
        status: u16,
        body: serde_json::Value,
    ) -> &Self {
        self.respond(method, url, HttpResponse::json(status, &body))
    }

    /// Queue a transport failure (no response received)
    pub fn fail(&self, method: HttpMethod, url: &str, message: &str) -> &Self {
        self.push(method, url, Reply::TransportError(message.to_string()));
        self
    }

    /// All requests seen so far, in order
    pub fn requests(&self) -> Vec<HttpRequest> {
        lock(&self.requests).clone()
    }

    /// Number of requests made to one method and URL
    pub fn calls(&self, method: HttpMethod, url: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.method == method && r.url == url)
            .count()
    }

    /// Number of requests whose URL starts with `prefix`
    pub fn calls_with_prefix(&self, prefix: &str) -> usize {
        lock(&self.requests)
            .iter()
            .filter(|r| r.url.starts_with(prefix))
            .count()
    }
}

impl HttpClient for MockHttpClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        lock(&self.requests).push(request.clone());

        let reply = {
            let mut routes = lock(&self.routes);
            let queue = routes.get_mut(&(request.method, request.url.clone()));
            match queue {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match reply {
            Some(Reply::Response(response)) => Ok(response),
            Some(Reply::TransportError(message)) => Err(DsxError::Transport {
                url: request.url.clone(),
                message,
            }),
            None => Err(DsxError::Transport {
                url: request.url.clone(),
                message: format!("no scripted response for {} {}", request.method, request.url),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_replies_in_order_last_sticky() {
        let mock = MockHttpClient::new();
        mock.respond_json(HttpMethod::Get, "http://h/n/1", 200, json!({"state": "REQUESTED"}))
            .respond_json(HttpMethod::Get, "http://h/n/1", 200, json!({"state": "FINALIZED"}));

        let req = HttpRequest::get("http://h/n/1");
        assert!(mock.execute(&req).unwrap().body.contains("REQUESTED"));
        assert!(mock.execute(&req).unwrap().body.contains("FINALIZED"));
        assert!(mock.execute(&req).unwrap().body.contains("FINALIZED"));
        assert_eq!(mock.calls(HttpMethod::Get, "http://h/n/1"), 3);
    }

    #[test]
    fn test_unscripted_route_is_transport_error() {
        let mock = MockHttpClient::new();
        let err = mock.execute(&HttpRequest::get("http://h/missing")).unwrap_err();
        assert!(matches!(err, DsxError::Transport { .. }));
        assert_eq!(mock.requests().len(), 1);
    }

    #[test]
    fn test_scripted_transport_failure() {
        let mock = MockHttpClient::new();
        mock.fail(HttpMethod::Post, "http://h/x", "connection refused");
        let err = mock
            .execute(&HttpRequest::post_json("http://h/x", &json!({})))
            .unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(mock.calls_with_prefix("http://h/"), 1);
    }

    #[test]
    fn test_method_distinguishes_routes() {
        let mock = MockHttpClient::new();
        mock.respond(HttpMethod::Post, "http://h/x", HttpResponse::new(201, ""));
        assert!(mock.execute(&HttpRequest::get("http://h/x")).is_err());
        assert_eq!(
            mock.execute(&HttpRequest::post_json("http://h/x", &json!({})))
                .unwrap()
                .status,
            201
        );
    }
}
