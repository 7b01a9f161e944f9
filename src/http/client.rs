/*!
 * reqwest-backed blocking HTTP client
 */

use super::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use crate::error::{DsxError, Result};
use std::time::Duration;
use tracing::trace;

/// Production [`HttpClient`] on top of `reqwest::blocking`
#[derive(Debug, Clone)]
pub struct BlockingHttpClient {
    client: reqwest::blocking::Client,
    default_timeout: Duration,
}

impl BlockingHttpClient {
    /// Build a client whose requests time out after `default_timeout`
    /// unless the request carries its own timeout
    pub fn new(default_timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(default_timeout)
            .user_agent(concat!("dsx/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DsxError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            default_timeout,
        })
    }
}

impl HttpClient for BlockingHttpClient {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let timeout = request.timeout.unwrap_or(self.default_timeout);
        trace!(method = %request.method, url = %request.url, ?timeout, "HTTP request");

        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        }
        .timeout(timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let transport = |e: reqwest::Error| DsxError::Transport {
            url: request.url.clone(),
            message: if e.is_timeout() {
                format!("timed out after {:.1}s", timeout.as_secs_f64())
            } else {
                e.to_string()
            },
        };

        let response = builder.send().map_err(&transport)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.text().map_err(&transport)?;

        trace!(status, bytes = body.len(), "HTTP response");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
