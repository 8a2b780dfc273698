//! Axum HTTP handlers for the inspection server
//!
//! Provides the static status endpoint, the echo endpoint, and the fallback for unmatched paths.

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{header, Uri},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use tracing::debug;

use crate::errors::AppError;
use crate::AppState;

pub const STATUS_MESSAGE: &str = "Server is running. Use /echo endpoint";

pub async fn root() -> &'static str {
    STATUS_MESSAGE
}

/// Responds with the request body, byte for byte.
pub async fn echo(State(state): State<AppState>, request: Request) -> Result<Response, AppError> {
    let limit = state.max_body_bytes;
    let body = to_bytes(request.into_body(), limit)
        .await
        .map_err(|err| body_error(err, limit))?;

    debug!(bytes = body.len(), "echoing request body");
    Ok(([(header::CONTENT_TYPE, "text/plain")], body).into_response())
}

pub async fn not_found(uri: Uri) -> AppError {
    AppError::not_found(uri.path())
}

fn body_error(err: axum::Error, limit: usize) -> AppError {
    let source = err.into_inner();
    if source.downcast_ref::<LengthLimitError>().is_some() {
        AppError::payload_too_large(limit)
    } else {
        AppError::bad_request("body_read_failed", source.to_string())
    }
}
