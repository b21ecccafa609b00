//! HTTP handlers for CMS content images.
//!
//! Content images have no catalog rows; the `content-images` container is
//! the source of truth and is listed directly.

use crate::{
    errors::AppError,
    handlers::upload::read_files,
    models::{asset::StoredFile, upload::FileRole},
    services::{
        asset_pipeline::classify,
        local_store::ListObjectsParams,
        object_store::{AssetCategory, Container},
        sanitizer::sanitize_filename,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ContentUploadQuery {
    /// Optional folder the images are stored under.
    pub folder: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListContentQuery {
    pub prefix: Option<String>,
    #[serde(rename = "max-keys")]
    pub max_keys: Option<usize>,
    #[serde(rename = "continuation-token")]
    pub continuation_token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ContentImage {
    pub path: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub etag: Option<String>,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ContentImageList {
    pub images: Vec<ContentImage>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// `POST /content/images?folder=`
pub async fn upload_content_images(
    State(state): State<AppState>,
    Query(q): Query<ContentUploadQuery>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<StoredFile>>), AppError> {
    let folder = q
        .folder
        .as_deref()
        .map(sanitize_filename)
        .unwrap_or_default();

    let files = read_files(multipart).await?;
    for file in &files {
        if classify(&file.original_name, &file.content_type)? != FileRole::Image {
            return Err(AppError::bad_request(format!(
                "`{}` is not an image; only images can be uploaded as content",
                file.original_name
            )));
        }
    }

    let outcome = state.content.process(&folder, files).await?;
    Ok((
        StatusCode::CREATED,
        Json(outcome.entries(FileRole::Image).to_vec()),
    ))
}

/// `GET /content/images`: paged listing, supports ?prefix=&max-keys=&continuation-token=
pub async fn list_content_images(
    State(state): State<AppState>,
    Query(q): Query<ListContentQuery>,
) -> Result<Json<ContentImageList>, AppError> {
    let params = ListObjectsParams {
        prefix: q.prefix,
        continuation_token: q.continuation_token.as_deref().map(decode_continuation_token),
        max_keys: q.max_keys.unwrap_or(1000),
    };

    let result = state
        .objects
        .list_objects(Container::ContentImages, params)
        .await?;

    let images = result
        .objects
        .into_iter()
        .map(|obj| ContentImage {
            url: state.objects.public_url(Container::ContentImages, &obj.key),
            path: obj.key,
            content_type: obj.content_type,
            size_bytes: obj.size_bytes,
            etag: obj.etag,
            last_modified: obj.last_modified,
        })
        .collect();

    Ok(Json(ContentImageList {
        images,
        is_truncated: result.is_truncated,
        next_continuation_token: result
            .next_continuation_token
            .as_deref()
            .map(encode_continuation_token),
    }))
}

/// `DELETE /content/images/{*path}`: best-effort, always 204.
pub async fn delete_content_image(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> StatusCode {
    state.assets().delete(&path, AssetCategory::Content).await;
    StatusCode::NO_CONTENT
}

fn encode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD.encode(token)
}

fn decode_continuation_token(token: &str) -> String {
    general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| token.to_string())
}
