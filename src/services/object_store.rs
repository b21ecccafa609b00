//! Object store abstraction shared by the upload pipeline and handlers.
//!
//! Three fixed containers hold the three kinds of assets. Backends only see
//! `(container, key)` pairs; the category → container mapping lives here.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{fmt, io, str::FromStr};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object `{key}` not found in container `{container}`")]
    ObjectNotFound { container: String, key: String },
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("unknown container `{0}`")]
    UnknownContainer(String),
    #[error("upload failed: {0}")]
    UploadFailed(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A storage container (bucket).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Container {
    #[serde(rename = "product-images")]
    ProductImages,
    #[serde(rename = "product-models")]
    ProductModels,
    #[serde(rename = "content-images")]
    ContentImages,
}

impl Container {
    pub const ALL: [Container; 3] = [
        Container::ProductImages,
        Container::ProductModels,
        Container::ContentImages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Container::ProductImages => "product-images",
            Container::ProductModels => "product-models",
            Container::ContentImages => "content-images",
        }
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Container {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Container::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| StorageError::UnknownContainer(s.to_string()))
    }
}

/// Caller-facing asset category.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    Image,
    Model,
    Content,
}

/// Container holding assets of `category`.
pub fn container_for(category: AssetCategory) -> Container {
    match category {
        AssetCategory::Image => Container::ProductImages,
        AssetCategory::Model => Container::ProductModels,
        AssetCategory::Content => Container::ContentImages,
    }
}

/// Backend contract for object storage.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Write `data` at `key`, replacing any existing object, and return the
    /// public URL it is served from.
    async fn put_object(
        &self,
        container: Container,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String>;

    /// Remove the object at `key`. Returns `ObjectNotFound` when absent.
    async fn delete_object(&self, container: Container, key: &str) -> StorageResult<()>;
}

#[cfg(test)]
pub mod memory {
    //! In-memory `ObjectStore` double for tests.

    use super::*;
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    #[derive(Default)]
    pub struct MemoryObjectStore {
        objects: Mutex<HashMap<(Container, String), (Bytes, String)>>,
        puts: AtomicUsize,
        fail_on_put: Option<usize>,
    }

    impl MemoryObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the `n`th put (1-based) with an upload error.
        pub fn failing_on_put(n: usize) -> Self {
            Self {
                fail_on_put: Some(n),
                ..Self::default()
            }
        }

        pub fn get(&self, container: Container, key: &str) -> Option<Bytes> {
            self.objects
                .lock()
                .unwrap()
                .get(&(container, key.to_string()))
                .map(|(data, _)| data.clone())
        }

        pub fn keys(&self, container: Container) -> Vec<String> {
            let mut keys: Vec<String> = self
                .objects
                .lock()
                .unwrap()
                .keys()
                .filter(|(c, _)| *c == container)
                .map(|(_, k)| k.clone())
                .collect();
            keys.sort();
            keys
        }

        pub fn len(&self) -> usize {
            self.objects.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ObjectStore for MemoryObjectStore {
        async fn put_object(
            &self,
            container: Container,
            key: &str,
            data: Bytes,
            content_type: &str,
        ) -> StorageResult<String> {
            let n = self.puts.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on_put == Some(n) {
                return Err(StorageError::UploadFailed(format!(
                    "simulated failure writing {container}/{key}"
                )));
            }
            self.objects
                .lock()
                .unwrap()
                .insert((container, key.to_string()), (data, content_type.to_string()));
            Ok(format!("http://assets.test/assets/{container}/{key}"))
        }

        async fn delete_object(&self, container: Container, key: &str) -> StorageResult<()> {
            match self
                .objects
                .lock()
                .unwrap()
                .remove(&(container, key.to_string()))
            {
                Some(_) => Ok(()),
                None => Err(StorageError::ObjectNotFound {
                    container: container.to_string(),
                    key: key.to_string(),
                }),
            }
        }
    }
}
