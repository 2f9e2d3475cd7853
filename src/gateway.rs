//! Authenticated Remote-Fetch Gateway
//!
//! Fetches remote images on behalf of the browser. The target URL is checked
//! against the host allow-list before anything touches the network, and the
//! credential is attached only on the outbound leg.

use crate::credentials::ApiKey;
use crate::transport::{HttpTransport, OutboundRequest, TransportError};
use bytes::Bytes;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound on the upstream body excerpt carried by errors.
pub const ERROR_EXCERPT_CHARS: usize = 300;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("URL host not allowed: {url}")]
    ForbiddenHost { url: String },

    #[error("Upstream image fetch failed ({status}): {excerpt}")]
    UpstreamFetch { status: u16, excerpt: String },

    #[error("Upstream image fetch timed out after {}s", .timeout.as_secs())]
    UpstreamTimeout { timeout: Duration },

    #[error("Upstream image fetch failed: {0}")]
    Transport(String),
}

/// Remote hosts the gateway may contact: one domain and its subdomains.
#[derive(Debug, Clone)]
pub struct HostAllowList {
    domain: String,
}

impl HostAllowList {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into().trim().trim_matches('.').to_ascii_lowercase(),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_allowed_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        host == self.domain
            || host
                .strip_suffix(self.domain.as_str())
                .map(|prefix| prefix.ends_with('.') && prefix.len() > 1)
                .unwrap_or(false)
    }

    /// Parse `raw_url` and accept it only for http(s) on an allowed host.
    ///
    /// Credentials in the authority and explicit ports are rejected as well.
    pub fn check(&self, raw_url: &str) -> Result<Url, GatewayError> {
        let forbidden = || GatewayError::ForbiddenHost {
            url: raw_url.to_string(),
        };
        let url = Url::parse(raw_url.trim()).map_err(|_| forbidden())?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(forbidden());
        }
        if !url.username().is_empty() || url.password().is_some() || url.port().is_some() {
            return Err(forbidden());
        }
        match url.host_str() {
            Some(host) if self.is_allowed_host(host) => Ok(url),
            _ => Err(forbidden()),
        }
    }
}

/// Bytes and content type of a fetched image
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Fetches allow-listed images through the outbound transport
pub struct ImageGateway {
    transport: Arc<dyn HttpTransport>,
    allow_list: HostAllowList,
    user_agent: String,
    referer: Option<String>,
}

impl ImageGateway {
    pub fn new(transport: Arc<dyn HttpTransport>, allow_list: HostAllowList) -> Self {
        Self {
            transport,
            allow_list,
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
            referer: None,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    pub fn allow_list(&self) -> &HostAllowList {
        &self.allow_list
    }

    /// Fetch `url` with `credential` attached as a bearer token.
    pub async fn fetch(
        &self,
        url: &str,
        credential: &ApiKey,
        timeout: Duration,
    ) -> Result<FetchedImage, GatewayError> {
        self.fetch_with(url, Some(credential), timeout).await
    }

    /// Fetch `url` without a credential. The allow-list still applies.
    pub async fn fetch_anonymous(
        &self,
        url: &str,
        timeout: Duration,
    ) -> Result<FetchedImage, GatewayError> {
        self.fetch_with(url, None, timeout).await
    }

    async fn fetch_with(
        &self,
        raw_url: &str,
        credential: Option<&ApiKey>,
        timeout: Duration,
    ) -> Result<FetchedImage, GatewayError> {
        let url = self.allow_list.check(raw_url)?;
        let host = url.host_str().unwrap_or_default().to_string();

        let mut request =
            OutboundRequest::get(url, timeout).header("User-Agent", self.user_agent.as_str());
        if let Some(key) = credential {
            request = request.header("Authorization", format!("Bearer {}", key.expose()));
        }
        if let Some(referer) = &self.referer {
            request = request.header("Referer", referer.as_str());
        }

        let response = self.transport.get(request).await.map_err(|e| match e {
            TransportError::Timeout(timeout) => GatewayError::UpstreamTimeout { timeout },
            TransportError::Request(message) => GatewayError::Transport(scrub(credential, &message)),
        })?;

        if response.status != 200 {
            let excerpt: String = scrub(credential, &response.text())
                .chars()
                .take(ERROR_EXCERPT_CHARS)
                .collect();
            warn!(host = %host, status = response.status, "Upstream image fetch rejected");
            return Err(GatewayError::UpstreamFetch {
                status: response.status,
                excerpt,
            });
        }

        debug!(host = %host, bytes = response.body.len(), "Upstream image fetched");
        Ok(FetchedImage {
            content_type: response
                .content_type
                .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string()),
            bytes: response.body,
        })
    }
}

fn scrub(credential: Option<&ApiKey>, text: &str) -> String {
    match credential {
        Some(key) => key.scrub(text),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{secs, RecordingTransport};

    fn gateway(transport: Arc<RecordingTransport>) -> ImageGateway {
        ImageGateway::new(transport, HostAllowList::new("civitai.com"))
            .with_referer("https://civitai.com/")
    }

    #[test]
    fn allow_list_accepts_domain_and_subdomains() {
        let allow = HostAllowList::new("civitai.com");
        assert!(allow.check("https://image.civitai.com/x.png").is_ok());
        assert!(allow.check("http://civitai.com/x.png").is_ok());
        assert!(allow.check("https://IMAGE.CIVITAI.COM/x.png").is_ok());
    }

    #[test]
    fn allow_list_rejects_everything_else() {
        let allow = HostAllowList::new("civitai.com");
        for url in [
            "https://evil.example.com/x.png",
            "https://evilcivitai.com/x.png",
            "https://civitai.com.evil.example/x.png",
            "ftp://image.civitai.com/x.png",
            "file:///etc/passwd",
            "https://user:pw@image.civitai.com/x.png",
            "https://image.civitai.com:8443/x.png",
            "not a url",
            "",
        ] {
            assert!(
                matches!(allow.check(url), Err(GatewayError::ForbiddenHost { .. })),
                "expected rejection for {}",
                url
            );
        }
    }

    #[tokio::test]
    async fn forbidden_host_never_reaches_network() {
        let transport = Arc::new(RecordingTransport::new().respond(200, "image/png", "x"));
        let gw = gateway(transport.clone());
        let err = gw
            .fetch("https://evil.example.com/x.png", &ApiKey::new("k"), secs(60))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ForbiddenHost { .. }));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn fetch_attaches_credential_outbound() {
        let transport = Arc::new(RecordingTransport::new().respond(200, "image/webp", "pixels"));
        let gw = gateway(transport.clone());
        let image = gw
            .fetch("https://image.civitai.com/x.png", &ApiKey::new("k"), secs(60))
            .await
            .unwrap();
        assert_eq!(image.content_type, "image/webp");
        assert_eq!(&image.bytes[..], b"pixels");

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].header_value("Authorization"), Some("Bearer k"));
        assert_eq!(requests[0].header_value("Referer"), Some("https://civitai.com/"));
        assert_eq!(requests[0].timeout, secs(60));
    }

    #[tokio::test]
    async fn non_200_carries_truncated_scrubbed_excerpt() {
        let body = format!("bad key s3cr3t-token {}", "x".repeat(1000));
        let transport = Arc::new(RecordingTransport::new().respond(403, "text/plain", body));
        let gw = gateway(transport);
        let err = gw
            .fetch(
                "https://image.civitai.com/x.png",
                &ApiKey::new("s3cr3t-token"),
                secs(60),
            )
            .await
            .unwrap_err();
        match err {
            GatewayError::UpstreamFetch { status, excerpt } => {
                assert_eq!(status, 403);
                assert_eq!(excerpt.chars().count(), ERROR_EXCERPT_CHARS);
                assert!(excerpt.starts_with("bad key ***redacted***"));
            }
            other => panic!("Expected upstream fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let transport = Arc::new(RecordingTransport::new().time_out());
        let gw = gateway(transport);
        let err = gw
            .fetch_anonymous("https://image.civitai.com/x.png", secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamTimeout { timeout } if timeout == secs(5)));
    }

    #[tokio::test]
    async fn missing_content_type_falls_back() {
        let transport = Arc::new(RecordingTransport::new());
        transport.push_raw(200, None, "raw");
        let gw = gateway(transport.clone());
        let image = gw
            .fetch_anonymous("https://image.civitai.com/x.png", secs(5))
            .await
            .unwrap();
        assert_eq!(image.content_type, "application/octet-stream");
        assert_eq!(transport.requests()[0].header_value("Authorization"), None);
    }
}
