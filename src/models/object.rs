//! Metadata for a payload held by the local object store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One stored object (blob) within a container.
///
/// Holds the metadata only; the bytes live on disk.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Object {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Container name (`product-images`, `product-models`, `content-images`).
    pub container: String,

    /// Object key (path-like identifier within the container).
    pub key: String,

    /// Last path segment of the key.
    pub filename: String,

    /// Content type (MIME type).
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 of the payload.
    pub etag: Option<String>,

    /// Timestamp of the last write.
    pub last_modified: DateTime<Utc>,
}
