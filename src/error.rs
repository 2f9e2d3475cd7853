//! Error types
//!
//! `ApiError` is the taxonomy every HTTP route converts into before answering.
//! Component errors (`GatewayError`, `GalleryError`) live beside their
//! components and convert into it here.

use crate::gallery::GalleryError;
use crate::gateway::GatewayError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};
use thiserror::Error;

/// Placeholder written in place of any credential-bearing value.
pub const REDACTED: &str = "***redacted***";

/// Route-boundary error taxonomy
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or missing required input
    #[error("{message}")]
    BadRequest {
        message: String,
        context: Map<String, Value>,
    },

    /// No credential configured
    #[error("{0}")]
    Unauthorized(String),

    /// Allow-list rejection for the fetch gateway
    #[error("URL host not allowed")]
    ForbiddenHost(String),

    /// Remote returned no matching item
    #[error("{message}")]
    NotFound {
        message: String,
        hint: String,
        context: Map<String, Value>,
    },

    /// Remote lookup answered with a non-success status; the status is passed through
    #[error("CivitAI request failed")]
    UpstreamStatus {
        status: u16,
        details: String,
        params: Map<String, Value>,
    },

    /// Remote image fetch failed or timed out
    #[error("{0}")]
    BadGateway(String),

    /// Listing failures and anything else the caller cannot fix
    #[error("{0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest {
            message: message.into(),
            context: Map::new(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest { .. } | ApiError::ForbiddenHost(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::UpstreamStatus { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) | ApiError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// JSON body returned to the caller. Never carries the credential.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("error".to_string(), Value::String(self.to_string()));
        match self {
            ApiError::BadRequest { context, .. } => {
                body.extend(context.clone());
            }
            ApiError::NotFound { hint, context, .. } => {
                body.extend(context.clone());
                body.insert("hint".to_string(), Value::String(hint.clone()));
            }
            ApiError::UpstreamStatus {
                status,
                details,
                params,
            } => {
                body.insert("status".to_string(), Value::from(*status));
                body.insert("details".to_string(), Value::String(details.clone()));
                body.insert("params".to_string(), Value::Object(params.clone()));
            }
            ApiError::ForbiddenHost(url) => {
                body.insert("url".to_string(), Value::String(url.clone()));
            }
            _ => {}
        }
        Value::Object(body)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::ForbiddenHost { url } => ApiError::ForbiddenHost(url),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

impl From<GalleryError> for ApiError {
    fn from(err: GalleryError) -> Self {
        match err {
            GalleryError::BadRequest { message, input } => {
                let mut context = Map::new();
                context.insert("url".to_string(), Value::String(input));
                ApiError::BadRequest { message, context }
            }
            GalleryError::NotFound { target } => {
                let mut context = Map::new();
                context.insert(
                    target.kind.query_key().to_string(),
                    Value::String(target.id.clone()),
                );
                ApiError::NotFound {
                    message: format!("No items returned for {}", target.kind.query_key()),
                    hint: target.kind.not_found_hint().to_string(),
                    context,
                }
            }
            GalleryError::Upstream {
                status,
                details,
                params,
            } => ApiError::UpstreamStatus {
                status,
                details,
                params,
            },
            other => ApiError::Internal(other.to_string()),
        }
    }
}
