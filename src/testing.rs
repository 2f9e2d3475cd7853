//! Test doubles shared by unit tests.

use crate::transport::{HttpTransport, OutboundRequest, TransportError, UpstreamResponse};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// Canned outcome for one transport call
pub(crate) enum Canned {
    Respond(UpstreamResponse),
    Timeout,
}

/// Transport that records every request and replays canned responses in order.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    requests: Mutex<Vec<OutboundRequest>>,
    responses: Mutex<VecDeque<Canned>>,
}

impl RecordingTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(self, status: u16, content_type: &str, body: impl Into<Bytes>) -> Self {
        self.responses
            .lock()
            .push_back(Canned::Respond(UpstreamResponse {
                status,
                content_type: Some(content_type.to_string()),
                body: body.into(),
            }));
        self
    }

    pub(crate) fn respond_json(self, status: u16, body: serde_json::Value) -> Self {
        self.respond(status, "application/json", body.to_string())
    }

    pub(crate) fn push_raw(&self, status: u16, content_type: Option<&str>, body: &'static str) {
        self.responses
            .lock()
            .push_back(Canned::Respond(UpstreamResponse {
                status,
                content_type: content_type.map(str::to_string),
                body: Bytes::from_static(body.as_bytes()),
            }));
    }

    pub(crate) fn time_out(self) -> Self {
        self.responses.lock().push_back(Canned::Timeout);
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    pub(crate) fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for RecordingTransport {
    async fn get(&self, request: OutboundRequest) -> Result<UpstreamResponse, TransportError> {
        let timeout = request.timeout;
        self.requests.lock().push(request);
        match self.responses.lock().pop_front() {
            Some(Canned::Respond(response)) => Ok(response),
            Some(Canned::Timeout) => Err(TransportError::Timeout(timeout)),
            None => Err(TransportError::Request(
                "no canned response left".to_string(),
            )),
        }
    }
}

pub(crate) fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}
