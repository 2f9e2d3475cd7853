//! Gallery Query Façade
//!
//! Forwards listing and single-item lookups to the remote gallery's images
//! endpoint. Listing results pass through unshaped. Lookups accept a bare id
//! or a gallery page URL and query by exactly one resolved identifier.

use crate::credentials::ApiKey;
use crate::error::REDACTED;
use crate::transport::{HttpTransport, OutboundRequest, TransportError};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Hard cap on the page size forwarded upstream, whatever the caller asks for.
pub const MAX_LIST_LIMIT: u32 = 200;

const DETAILS_EXCERPT_CHARS: usize = 300;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("{message}")]
    BadRequest { message: String, input: String },

    #[error("No items returned for {}", .target.kind.query_key())]
    NotFound { target: LookupTarget },

    #[error("CivitAI request failed ({status})")]
    Upstream {
        status: u16,
        details: String,
        params: Map<String, Value>,
    },

    #[error("CivitAI listing failed ({status}): {excerpt}")]
    ListingFailed { status: u16, excerpt: String },

    #[error("CivitAI request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("CivitAI request failed: {0}")]
    Transport(String),

    #[error("Invalid CivitAI response: {0}")]
    InvalidResponse(String),

    #[error("Invalid CivitAI endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Which identifier a lookup queries by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Image,
    Post,
}

impl LookupKind {
    /// Query parameter name on the remote images endpoint.
    pub fn query_key(&self) -> &'static str {
        match self {
            LookupKind::Image => "imageId",
            LookupKind::Post => "postId",
        }
    }

    /// Path segment on the gallery website.
    pub fn page_segment(&self) -> &'static str {
        match self {
            LookupKind::Image => "images",
            LookupKind::Post => "posts",
        }
    }

    pub fn not_found_hint(&self) -> &'static str {
        match self {
            LookupKind::Post => {
                "If this is a video-only post, /api/v1/images may return empty. \
                 Otherwise it may be restricted by browsing settings."
            }
            LookupKind::Image => {
                "This can happen for login-gated images or due to imageId lookup \
                 behavior returning empty."
            }
        }
    }
}

/// Resolved identifier for a single-item lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupTarget {
    pub kind: LookupKind,
    pub id: String,
}

impl LookupTarget {
    pub fn image(id: impl Into<String>) -> Self {
        Self {
            kind: LookupKind::Image,
            id: id.into(),
        }
    }

    pub fn post(id: impl Into<String>) -> Self {
        Self {
            kind: LookupKind::Post,
            id: id.into(),
        }
    }
}

fn is_numeric_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Resolve a lookup target from a bare id or a page URL.
///
/// Path segments `/images/{id}` and `/posts/{id}` win. Only when the path
/// yields nothing are the `postId` / `imageId` query parameters consulted,
/// with `postId` taking precedence.
pub fn resolve_lookup_target(input: &str) -> Result<LookupTarget, GalleryError> {
    let input = input.trim();
    let unparseable = || GalleryError::BadRequest {
        message: "Could not parse postId or imageId from URL".to_string(),
        input: input.to_string(),
    };

    if input.is_empty() {
        return Err(GalleryError::BadRequest {
            message: "Missing url parameter".to_string(),
            input: String::new(),
        });
    }
    if is_numeric_id(input) {
        return Ok(LookupTarget::image(input));
    }

    let url = Url::parse(input).map_err(|_| unparseable())?;

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();
    if let [kind, id, ..] = segments.as_slice() {
        if is_numeric_id(id) {
            match kind.to_ascii_lowercase().as_str() {
                "images" => return Ok(LookupTarget::image(*id)),
                "posts" => return Ok(LookupTarget::post(*id)),
                _ => {}
            }
        }
    }

    let query_value = |key: &str| {
        url.query_pairs()
            .find(|(k, v)| k == key && !v.trim().is_empty())
            .map(|(_, v)| v.trim().to_string())
    };
    if let Some(post_id) = query_value("postId") {
        return Ok(LookupTarget::post(post_id));
    }
    if let Some(image_id) = query_value("imageId") {
        return Ok(LookupTarget::image(image_id));
    }

    Err(unparseable())
}

/// Copy of outbound parameters safe to show the caller.
pub fn redact_params(params: &[(String, String)]) -> Map<String, Value> {
    params
        .iter()
        .map(|(key, value)| {
            let value = if key == "token" && !value.is_empty() {
                REDACTED.to_string()
            } else {
                value.clone()
            };
            (key.clone(), Value::String(value))
        })
        .collect()
}

/// Raw listing query as received from the browser
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<String>,
    pub sort: Option<String>,
    pub period: Option<String>,
    pub nsfw: Option<String>,
    pub cursor: Option<String>,
}

/// Defaults applied to listing parameters the caller left out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListDefaults {
    pub limit: u32,
    pub sort: String,
    pub period: String,
    pub nsfw: String,
}

impl Default for ListDefaults {
    fn default() -> Self {
        Self {
            limit: 36,
            sort: "Most Reactions".to_string(),
            period: "AllTime".to_string(),
            nsfw: "None".to_string(),
        }
    }
}

/// Listing parameters forwarded upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilters {
    pub limit: u32,
    pub sort: String,
    pub period: String,
    pub nsfw: String,
    pub cursor: Option<String>,
}

impl ListFilters {
    /// Apply defaults and validate. A blank cursor is dropped.
    pub fn resolve(query: ListQuery, defaults: &ListDefaults) -> Result<Self, GalleryError> {
        let limit = match query.limit.as_deref().map(str::trim) {
            None | Some("") => defaults.limit,
            Some(raw) => parse_limit(raw).ok_or_else(|| GalleryError::BadRequest {
                message: format!("Invalid limit '{}'", raw),
                input: raw.to_string(),
            })?,
        };
        let or_default = |value: Option<String>, default: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        Ok(Self {
            limit,
            sort: or_default(query.sort, &defaults.sort),
            period: or_default(query.period, &defaults.period),
            nsfw: or_default(query.nsfw, &defaults.nsfw),
            cursor: query
                .cursor
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
        })
    }
}

/// Any integer is accepted and clamped into `0..=MAX_LIST_LIMIT`, however
/// many digits it has. `None` only for text that is not an integer.
fn parse_limit(raw: &str) -> Option<u32> {
    let (negative, digits) = match raw.as_bytes().first() {
        Some(b'-') => (true, &raw[1..]),
        Some(b'+') => (false, &raw[1..]),
        _ => (false, raw),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if negative {
        return Some(0);
    }
    let value = digits.parse::<u64>().unwrap_or(u64::MAX);
    Some(value.min(u64::from(MAX_LIST_LIMIT)) as u32)
}

/// Listing page passed through from the remote service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryListing {
    pub items: Value,
    pub metadata: Value,
}

/// Client for the remote images endpoint
pub struct GalleryClient {
    transport: Arc<dyn HttpTransport>,
    images_url: Url,
    request_timeout: Duration,
    max_list_limit: u32,
    lookup_nsfw: String,
    user_agent: String,
}

impl GalleryClient {
    /// `api_base` is the API root, e.g. `https://civitai.com/api/v1`.
    pub fn new(transport: Arc<dyn HttpTransport>, api_base: &str) -> Result<Self, GalleryError> {
        let endpoint = format!("{}/images", api_base.trim().trim_end_matches('/'));
        let images_url =
            Url::parse(&endpoint).map_err(|e| GalleryError::InvalidEndpoint(e.to_string()))?;
        Ok(Self {
            transport,
            images_url,
            request_timeout: Duration::from_secs(30),
            max_list_limit: MAX_LIST_LIMIT,
            lookup_nsfw: "X".to_string(),
            user_agent: crate::config::DEFAULT_USER_AGENT.to_string(),
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Lower the page-size cap. Values above [`MAX_LIST_LIMIT`] are clamped.
    pub fn with_max_list_limit(mut self, max: u32) -> Self {
        self.max_list_limit = max.min(MAX_LIST_LIMIT);
        self
    }

    pub fn with_lookup_nsfw(mut self, nsfw: impl Into<String>) -> Self {
        self.lookup_nsfw = nsfw.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn request(&self, params: &[(String, String)], key: &ApiKey) -> OutboundRequest {
        let mut url = self.images_url.clone();
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        OutboundRequest::get(url, self.request_timeout)
            .header("User-Agent", self.user_agent.as_str())
            .header("Authorization", format!("Bearer {}", key.expose()))
    }

    fn map_transport(&self, key: &ApiKey, err: TransportError) -> GalleryError {
        match err {
            TransportError::Timeout(timeout) => GalleryError::Timeout(timeout),
            TransportError::Request(message) => GalleryError::Transport(key.scrub(&message)),
        }
    }

    /// One listing page.
    pub async fn list(
        &self,
        filters: &ListFilters,
        key: &ApiKey,
    ) -> Result<GalleryListing, GalleryError> {
        let mut params = vec![
            (
                "limit".to_string(),
                filters.limit.min(self.max_list_limit).to_string(),
            ),
            ("sort".to_string(), filters.sort.clone()),
            ("period".to_string(), filters.period.clone()),
            ("nsfw".to_string(), filters.nsfw.clone()),
        ];
        if let Some(cursor) = &filters.cursor {
            params.push(("cursor".to_string(), cursor.clone()));
        }

        let response = self
            .transport
            .get(self.request(&params, key))
            .await
            .map_err(|e| self.map_transport(key, e))?;
        if !response.is_success() {
            warn!(status = response.status, "Gallery listing rejected upstream");
            return Err(GalleryError::ListingFailed {
                status: response.status,
                excerpt: excerpt(key, &response.text()),
            });
        }

        let data: Value = serde_json::from_slice(&response.body)
            .map_err(|e| GalleryError::InvalidResponse(e.to_string()))?;
        let items = match data.get("items") {
            Some(items @ Value::Array(_)) => items.clone(),
            _ => Value::Array(Vec::new()),
        };
        let metadata = match data.get("metadata") {
            Some(meta @ Value::Object(_)) => meta.clone(),
            _ => Value::Object(Map::new()),
        };
        debug!(
            items = items.as_array().map(Vec::len).unwrap_or(0),
            "Gallery listing fetched"
        );
        Ok(GalleryListing { items, metadata })
    }

    /// Look up a single item from a bare id or a page URL.
    pub async fn lookup(&self, input: &str, key: &ApiKey) -> Result<Value, GalleryError> {
        let target = resolve_lookup_target(input)?;
        self.lookup_target(&target, key).await
    }

    pub async fn lookup_target(
        &self,
        target: &LookupTarget,
        key: &ApiKey,
    ) -> Result<Value, GalleryError> {
        let params = vec![
            (target.kind.query_key().to_string(), target.id.clone()),
            ("limit".to_string(), "1".to_string()),
            ("token".to_string(), key.expose().to_string()),
            ("nsfw".to_string(), self.lookup_nsfw.clone()),
        ];

        let response = self
            .transport
            .get(self.request(&params, key))
            .await
            .map_err(|e| self.map_transport(key, e))?;
        if response.status != 200 {
            warn!(
                status = response.status,
                kind = target.kind.query_key(),
                id = %target.id,
                "Gallery lookup rejected upstream"
            );
            return Err(GalleryError::Upstream {
                status: response.status,
                details: excerpt(key, &response.text()),
                params: redact_params(&params),
            });
        }

        let data: Value = serde_json::from_slice(&response.body)
            .map_err(|e| GalleryError::InvalidResponse(e.to_string()))?;
        match data
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
        {
            Some(item) => {
                info!(kind = target.kind.query_key(), id = %target.id, "Gallery item resolved");
                Ok(item.clone())
            }
            None => Err(GalleryError::NotFound {
                target: target.clone(),
            }),
        }
    }
}

fn excerpt(key: &ApiKey, text: &str) -> String {
    key.scrub(text).chars().take(DETAILS_EXCERPT_CHARS).collect()
}
