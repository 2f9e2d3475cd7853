//! Shared harness for the HTTP integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use civitai_gallery::config::ServiceConfig;
use civitai_gallery::credentials::{ApiKey, StaticCredential};
use civitai_gallery::transport::{HttpTransport, OutboundRequest, TransportError, UpstreamResponse};
use civitai_gallery::AppState;
use parking_lot::Mutex;
use reqwest::Url;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const TOKEN: &str = "t0ps3cret-key";

/// Outbound transport that records requests and replays queued outcomes.
#[derive(Default)]
pub struct FakeUpstream {
    requests: Mutex<Vec<OutboundRequest>>,
    responses: Mutex<VecDeque<Result<UpstreamResponse, TransportError>>>,
}

impl FakeUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn queue(&self, status: u16, content_type: &str, body: impl Into<Bytes>) {
        self.responses.lock().push_back(Ok(UpstreamResponse {
            status,
            content_type: Some(content_type.to_string()),
            body: body.into(),
        }));
    }

    /// Next request fails as if the deadline passed.
    pub fn queue_timeout(&self) {
        self.responses
            .lock()
            .push_back(Err(TransportError::Timeout(Duration::from_secs(30))));
    }

    pub fn queue_json(&self, status: u16, body: Value) {
        self.queue(status, "application/json", body.to_string());
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for FakeUpstream {
    async fn get(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Request("connection refused".to_string())))
    }
}

/// Router under the default `/civitai_gallery` prefix.
pub struct Harness {
    pub state: AppState,
    pub upstream: Arc<FakeUpstream>,
    router: Router,
}

impl Harness {
    pub fn with_key() -> Self {
        Self::build(Some(TOKEN))
    }

    pub fn without_key() -> Self {
        Self::build(None)
    }

    fn build(token: Option<&str>) -> Self {
        let upstream = FakeUpstream::new();
        let credentials = Arc::new(StaticCredential::new(token.map(ApiKey::new)));
        let state = AppState::with_parts(&ServiceConfig::default(), upstream.clone(), credentials)
            .expect("default config wires cleanly");
        let router = civitai_gallery::router(state.clone());
        Self {
            state,
            upstream,
            router,
        }
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<(String, String)>, Bytes) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.as_str().to_string(), v.to_str().unwrap_or("").to_string()))
            .collect();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body reads");
        (status, headers, body)
    }

    pub async fn get(&self, path_and_query: &str) -> (StatusCode, Value) {
        let request = Request::get(format!("/civitai_gallery{}", path_and_query))
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    pub async fn post(&self, path: &str, body: impl Into<Body>) -> (StatusCode, Value) {
        let request = Request::post(format!("/civitai_gallery{}", path))
            .header("content-type", "application/json")
            .body(body.into())
            .unwrap();
        let (status, _, body) = self.send(request).await;
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }
}

pub fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// `url=<raw>` query string, form-encoded.
pub fn url_param(raw: &str) -> String {
    let mut url = Url::parse("http://localhost/").unwrap();
    url.query_pairs_mut().append_pair("url", raw);
    url.query().unwrap_or_default().to_string()
}
