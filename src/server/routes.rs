//! Route handlers
//!
//! Every failure leaves as an [`ApiError`] JSON body; nothing here panics on
//! caller input.

use super::state::AppState;
use crate::credentials::ApiKey;
use crate::error::ApiError;
use crate::gallery::{GalleryListing, ListFilters, ListQuery};
use crate::metadata::id_string;
use crate::store::{PreviewPatch, PromptPatch};
use crate::types::StoreKind;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

const MISSING_KEY_FOR_LISTING: &str = "CivitAI API key missing (api_key.txt)";
const MISSING_KEY: &str = "Missing API key";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct UrlQuery {
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SignalQuery {
    node_id: Option<String>,
    store: Option<String>,
}

/// Query-string decoding failures leave as JSON like every other error.
fn query_params<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, ApiError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

fn parse_json(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid JSON"))
}

fn required_node_id(body: &Value) -> Result<String, ApiError> {
    body.get("node_id")
        .and_then(id_string)
        .ok_or_else(|| ApiError::bad_request("Missing node_id"))
}

/// `Some` when the caller sent the field; non-string values count as empty.
fn text_field(body: &Value, key: &str) -> Option<String> {
    body.get(key)
        .map(|value| value.as_str().unwrap_or_default().to_string())
}

fn require_key(state: &AppState, message: &str) -> Result<ApiKey, ApiError> {
    state
        .credentials
        .load()
        .ok_or_else(|| ApiError::Unauthorized(message.to_string()))
}

fn required_url(query: UrlQuery) -> Result<String, ApiError> {
    query
        .url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing url parameter"))
}

pub(crate) async fn set_prompt(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = parse_json(&body)?;
    let node_id = required_node_id(&body)?;
    let patch = PromptPatch {
        positive: text_field(&body, "positive"),
        negative: text_field(&body, "negative"),
    };
    let revision = state.stores.prompts.write(&node_id, patch);
    info!(node_id = %node_id, revision, "Prompt stored");
    Ok(Json(json!({"ok": true})))
}

pub(crate) async fn set_preview(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body = parse_json(&body)?;
    let node_id = required_node_id(&body)?;
    let patch = PreviewPatch {
        url: text_field(&body, "url").map(|url| url.trim().to_string()),
    };
    let revision = state.stores.previews.write(&node_id, patch);
    info!(node_id = %node_id, revision, "Preview URL stored");
    Ok(Json(json!({"ok": true})))
}

pub(crate) async fn list_images(
    State(state): State<AppState>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<GalleryListing>, ApiError> {
    let query = query_params(query)?;
    let key = require_key(&state, MISSING_KEY_FOR_LISTING)?;
    let filters = ListFilters::resolve(query, &state.list_defaults)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;
    let listing = state.gallery.list(&filters, &key).await?;
    Ok(Json(listing))
}

pub(crate) async fn image_by_url(
    State(state): State<AppState>,
    query: Result<Query<UrlQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let query = query_params(query)?;
    let key = require_key(&state, MISSING_KEY)?;
    let url = required_url(query)?;
    let item = state.gallery.lookup(&url, &key).await?;
    Ok(Json(json!({ "item": item })))
}

pub(crate) async fn proxy_image(
    State(state): State<AppState>,
    query: Result<Query<UrlQuery>, QueryRejection>,
) -> Result<Response, ApiError> {
    let query = query_params(query)?;
    let key = require_key(&state, MISSING_KEY)?;
    let url = required_url(query)?;
    let image = state.gateway.fetch(&url, &key, state.image_timeout).await?;
    Ok((
        [
            (CONTENT_TYPE, image.content_type),
            (CACHE_CONTROL, "no-store".to_string()),
        ],
        image.bytes,
    )
        .into_response())
}

pub(crate) async fn signal(
    State(state): State<AppState>,
    query: Result<Query<SignalQuery>, QueryRejection>,
) -> Result<Json<Value>, ApiError> {
    let query = query_params(query)?;
    let node_id = query
        .node_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing node_id"))?;
    let store = match query.store.as_deref() {
        None => StoreKind::Prompt,
        Some(raw) => raw.parse::<StoreKind>().map_err(ApiError::bad_request)?,
    };
    Ok(Json(json!({
        "node_id": node_id,
        "store": store,
        "signal": state.stores.signal(store, &node_id),
    })))
}
