//! Outbound HTTP port
//!
//! The gateway and the gallery façade talk to the remote service only through
//! [`HttpTransport`], so tests can substitute a recording implementation and
//! count the calls that reached the network layer.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

/// One GET issued to the remote service
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub timeout: Duration,
}

impl OutboundRequest {
    pub fn get(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw upstream answer; any status, body fully read
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),
}

/// Port for outbound GET requests.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError>;
}

/// [`HttpTransport`] backed by a shared reqwest client.
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let timeout = request.timeout;
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                TransportError::Timeout(timeout)
            } else {
                TransportError::Request(e.without_url().to_string())
            }
        };

        let mut builder = self.client.get(request.url).timeout(timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await.map_err(map_err)?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await.map_err(map_err)?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_lookup_ignores_case() {
        let request = OutboundRequest::get(
            Url::parse("https://civitai.com/api/v1/images").unwrap(),
            Duration::from_secs(1),
        )
        .header("Authorization", "Bearer k");
        assert_eq!(request.header_value("authorization"), Some("Bearer k"));
        assert_eq!(request.header_value("referer"), None);
    }

    #[test]
    fn success_range() {
        let ok = UpstreamResponse {
            status: 204,
            content_type: None,
            body: Bytes::new(),
        };
        assert!(ok.is_success());
        let not_found = UpstreamResponse {
            status: 404,
            ..ok
        };
        assert!(!not_found.is_success());
    }
}
