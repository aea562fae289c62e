//! Media streaming handler
//!
//! Unauthenticated so that browser `<video>` elements, which cannot attach
//! bearer tokens, can seek through large site recordings.

use crate::error::AppError;
use crate::middleware::metrics;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::IntoParams;
use uuid::Uuid;

/// Media lookup parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MediaQuery {
    /// Gallery object id
    pub id: Option<String>,
}

/// Stream a byte range of a stored media object
///
/// Without a `Range` header the first chunk is served. Open-ended ranges are
/// capped at one chunk so players fetch large files progressively.
#[utoipa::path(
    get,
    path = "/media",
    tag = "media",
    params(
        MediaQuery,
        ("Range" = Option<String>, Header, description = "bytes=<start>-[end]")
    ),
    responses(
        (status = 206, description = "Partial content"),
        (status = 200, description = "Whole object (size unknown or empty)"),
        (status = 400, description = "Missing or invalid id", body = crate::error::ApiError),
        (status = 404, description = "Media not found", body = crate::error::ApiError),
        (status = 416, description = "Range starts past the end", body = crate::error::ApiError),
        (status = 502, description = "Storage unavailable", body = crate::error::ApiError),
    )
)]
pub async fn media_handler(
    State(state): State<Arc<AppState>>,
    query: Result<Query<MediaQuery>, QueryRejection>,
    headers: HeaderMap,
) -> Response {
    let response = match serve_media(&state, query, &headers).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    };
    metrics::record_media_response(response.status().as_u16());
    response
}

async fn serve_media(
    state: &AppState,
    query: Result<Query<MediaQuery>, QueryRejection>,
    headers: &HeaderMap,
) -> Result<Response, AppError> {
    let Query(query) = query.map_err(|e| AppError::Validation(e.body_text()))?;
    let id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("Media id is required".to_string()))?;
    let id = Uuid::parse_str(id)
        .map_err(|_| AppError::Validation("Media id must be a UUID".to_string()))?;

    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    let media = state.media.fetch(id, range).await?;

    let status = if media.is_partial() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    let mut response = Response::builder()
        .status(status)
        .header(header::ACCEPT_RANGES, "bytes");

    if let Ok(value) = HeaderValue::from_str(&media.content_type) {
        response = response.header(header::CONTENT_TYPE, value);
    }
    if let Some(content_range) = media.window.content_range() {
        response = response.header(header::CONTENT_RANGE, content_range);
    }
    if let Some(length) = media.content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    response
        .body(Body::from_stream(media.upstream.bytes_stream()))
        .map_err(|e| AppError::Internal(format!("building media response: {e}")))
}
