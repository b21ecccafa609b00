//! Serves stored objects at their public URLs.
//! Streams object bodies to avoid buffering in memory.

use crate::{
    errors::AppError,
    models::object::Object,
    services::object_store::Container,
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use tokio_util::io::ReaderStream;

/// `GET /assets/{container}/{*key}`: stream an object.
pub async fn get_asset(
    State(state): State<AppState>,
    Path((container, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let container: Container = container.parse()?;
    let (meta, file) = state.objects.get_object_reader(container, &key).await?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

/// `HEAD /assets/{container}/{*key}`: same headers as GET but no body.
pub async fn head_asset(
    State(state): State<AppState>,
    Path((container, key)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let container: Container = container.parse()?;
    let meta = state.objects.get_object_metadata(container, &key).await?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    Ok(response)
}

fn set_object_headers(headers: &mut HeaderMap, meta: &Object) {
    let content_type = meta
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );

    if let Some(etag) = meta.etag.as_ref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{}\"", etag)) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Ok(value) = HeaderValue::from_str(&meta.last_modified.to_rfc2822()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
}
