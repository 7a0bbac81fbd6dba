//! Tile endpoint.

use axum::body::Body;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use super::error::ApiError;
use super::state::AppState;
use crate::tile::{TileRequest, TileResponse};

/// Header carrying the cache outcome of a tile response.
pub const CACHE_STATUS_HEADER: &str = "tile-cache";

/// `GET /maps/:map/:z/:x/:tile`
///
/// The raw query string is passed through unchanged; it scopes the cache
/// entry and feeds the generator's query parameters.
pub async fn get_tile(
    State(state): State<AppState>,
    Path((map, zoom, x, tile)): Path<(String, String, String, String)>,
    RawQuery(query): RawQuery,
) -> Response {
    let mut request = TileRequest::new(format!("/{}/{}/{}/{}", map, zoom, x, tile));
    if let Some(query) = query {
        request = request.with_query(query);
    }

    match state
        .middleware
        .serve(&request, state.generator.as_ref())
        .await
    {
        Ok(response) => {
            debug!(
                path = request.path(),
                status = response.status,
                cache = response.cache_status.map(|s| s.as_str()).unwrap_or("BYPASS"),
                "Tile served"
            );
            into_http_response(response)
        }
        Err(e) => {
            warn!(path = request.path(), error = %e, "Tile request failed");
            ApiError::from(e).into_response()
        }
    }
}

/// Convert a tile response into an HTTP response, streaming the body.
pub fn into_http_response(tile: TileResponse) -> Response {
    let status = StatusCode::from_u16(tile.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut response = Response::new(Body::from_stream(tile.body));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    if let Some(content_type) = tile
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        headers.insert(header::CONTENT_TYPE, content_type);
    }
    if let Some(cache_status) = tile.cache_status {
        headers.insert(
            CACHE_STATUS_HEADER,
            HeaderValue::from_static(cache_status.as_str()),
        );
    }

    response
}
