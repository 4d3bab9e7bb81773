//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use recs_core::ErrorKind;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler. The body is always
/// `{"reason": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error(transparent)]
  Service(#[from] recs_core::Error),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Service(e) if e.kind() == ErrorKind::NotFound => StatusCode::NOT_FOUND,
      ApiError::Service(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    let reason = self.to_string();
    if status.is_server_error() {
      tracing::error!(status = status.as_u16(), %reason, "request failed");
    } else {
      tracing::warn!(status = status.as_u16(), %reason, "request rejected");
    }
    (status, Json(json!({ "reason": reason }))).into_response()
  }
}
