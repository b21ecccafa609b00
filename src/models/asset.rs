//! Results of storing files in the object store.

use super::upload::FileRole;
use serde::{Deserialize, Serialize};

/// Where a stored file lives: a container-relative key and the public URL
/// it is served from.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredAsset {
    pub path: String,
    pub url: String,
}

/// A file stored by the asset pipeline.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoredFile {
    pub role: FileRole,
    pub original_name: String,
    pub sanitized_name: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub path: String,
    pub url: String,
}
