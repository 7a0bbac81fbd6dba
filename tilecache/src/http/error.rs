//! API error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::bulk::BulkError;
use crate::tile::TileError;

/// JSON body of API responses: `{"code":..,"message":..}` plus `isSlice`
/// on bulk run answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub code: u16,
    pub message: String,
    #[serde(rename = "isSlice", skip_serializing_if = "Option::is_none", default)]
    pub is_slice: Option<bool>,
}

impl ApiMessage {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: 200,
            message: message.into(),
            is_slice: None,
        }
    }

    pub fn with_is_slice(mut self, is_slice: bool) -> Self {
        self.is_slice = Some(is_slice);
        self
    }
}

/// Errors returned by API handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    GatewayTimeout(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            ApiError::GatewayTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiMessage {
            code: status.as_u16(),
            message: self.to_string(),
            is_slice: None,
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<BulkError> for ApiError {
    fn from(err: BulkError) -> Self {
        match err {
            BulkError::Join(_) => ApiError::Internal(err.to_string()),
            _ => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<TileError> for ApiError {
    fn from(err: TileError) -> Self {
        match err {
            TileError::InvalidRequest(_) => ApiError::BadRequest(err.to_string()),
            TileError::UnknownMap(_) => ApiError::NotFound(err.to_string()),
            TileError::Upstream(_) => ApiError::BadGateway(err.to_string()),
            TileError::Timeout(_) => ApiError::GatewayTimeout(err.to_string()),
            TileError::Database(_) | TileError::Template(_) | TileError::Body(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}
