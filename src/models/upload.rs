//! Transient upload payloads and the roles they play within a batch.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One file received from a multipart request.
///
/// Lives for the duration of a single request; nothing about it is persisted
/// beyond what the pipeline stores.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    /// Filename as sent by the client.
    pub original_name: String,

    /// Declared MIME type (may be a generic `application/octet-stream`).
    pub content_type: String,

    /// Raw file contents.
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(
        original_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            original_name: original_name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }
}

/// What a file is used for once it is part of a batch.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum FileRole {
    /// A product or content picture.
    Image,
    /// Geometry payload: a self-contained `.glb` or a `.bin` buffer.
    ModelBinary,
    /// Text glTF manifest referencing sibling files by name.
    ModelManifest,
    /// Texture referenced by a manifest.
    ModelAuxiliary,
}

impl FileRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileRole::Image => "image",
            FileRole::ModelBinary => "model_binary",
            FileRole::ModelManifest => "model_manifest",
            FileRole::ModelAuxiliary => "model_auxiliary",
        }
    }
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
