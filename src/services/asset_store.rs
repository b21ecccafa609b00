//! Category-aware facade over an injected `ObjectStore`.

use crate::{
    models::asset::StoredAsset,
    services::object_store::{
        AssetCategory, ObjectStore, StorageError, StorageResult, container_for,
    },
};
use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Stores and deletes assets by category.
///
/// Deletion is best-effort: it never fails, so it can sit next to a
/// database mutation without being able to block it.
#[derive(Clone)]
pub struct AssetStore {
    backend: Arc<dyn ObjectStore>,
}

impl AssetStore {
    pub fn new(backend: Arc<dyn ObjectStore>) -> Self {
        Self { backend }
    }

    /// Upload `data` to `destination` in the category's container.
    /// Overwrites whatever is already stored there.
    pub async fn store(
        &self,
        data: Bytes,
        content_type: &str,
        category: AssetCategory,
        destination: &str,
    ) -> StorageResult<StoredAsset> {
        let container = container_for(category);
        let size = data.len();
        let url = self
            .backend
            .put_object(container, destination, data, content_type)
            .await
            .map_err(|err| {
                error!(%container, key = destination, error = %err, "asset upload failed");
                match err {
                    err @ StorageError::InvalidObjectKey(_) => err,
                    err @ StorageError::UploadFailed(_) => err,
                    other => StorageError::UploadFailed(other.to_string()),
                }
            })?;

        debug!(%container, key = destination, size_bytes = size, "asset stored");
        Ok(StoredAsset {
            path: destination.to_string(),
            url,
        })
    }

    /// Delete `path` from the category's container, logging instead of
    /// returning failures.
    pub async fn delete(&self, path: &str, category: AssetCategory) {
        let container = container_for(category);
        match self.backend.delete_object(container, path).await {
            Ok(()) => debug!(%container, key = path, "asset deleted"),
            Err(StorageError::ObjectNotFound { .. }) => {
                warn!(%container, key = path, "asset to delete was not found");
            }
            Err(err) => {
                error!(%container, key = path, error = %err, "failed to delete asset");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::object_store::{Container, memory::MemoryObjectStore};
    use std::{fmt, sync::Mutex};
    use tracing::{
        Event, Level, Subscriber,
        field::{Field, Visit},
    };
    use tracing_subscriber::{layer::Context, prelude::*};

    /// Records the level and message of every event.
    #[derive(Clone, Default)]
    struct CapturedEvents(Arc<Mutex<Vec<(Level, String)>>>);

    impl CapturedEvents {
        fn at(&self, level: Level) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|(l, _)| *l == level)
                .map(|(_, message)| message.clone())
                .collect()
        }
    }

    struct MessageVisitor<'a>(&'a mut String);

    impl Visit for MessageVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                *self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> tracing_subscriber::Layer<S> for CapturedEvents {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut message = String::new();
            event.record(&mut MessageVisitor(&mut message));
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), message));
        }
    }

    #[tokio::test]
    async fn store_picks_container_by_category() {
        let backend = Arc::new(MemoryObjectStore::new());
        let store = AssetStore::new(backend.clone());

        let asset = store
            .store(Bytes::from_static(b"jpg"), "image/jpeg", AssetCategory::Content, "hero.jpg")
            .await
            .unwrap();

        assert_eq!(asset.path, "hero.jpg");
        assert_eq!(asset.url, "http://assets.test/assets/content-images/hero.jpg");
        assert!(backend.get(Container::ContentImages, "hero.jpg").is_some());
        assert!(backend.get(Container::ProductImages, "hero.jpg").is_none());
    }

    #[tokio::test]
    async fn backend_failures_surface_as_upload_failed() {
        let store = AssetStore::new(Arc::new(MemoryObjectStore::failing_on_put(1)));
        let err = store
            .store(Bytes::new(), "image/png", AssetCategory::Image, "p/a.png")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::UploadFailed(_)));
    }

    #[tokio::test]
    async fn deleting_unknown_path_warns_and_succeeds() {
        let events = CapturedEvents::default();
        let _guard = tracing_subscriber::registry()
            .with(events.clone())
            .set_default();

        let backend = Arc::new(MemoryObjectStore::new());
        let store = AssetStore::new(backend.clone());

        store.delete("never/stored.png", AssetCategory::Image).await;
        assert_eq!(backend.len(), 0);
        assert_eq!(events.at(Level::WARN), vec!["asset to delete was not found"]);
        assert!(events.at(Level::ERROR).is_empty());
    }

    #[tokio::test]
    async fn delete_removes_stored_asset() {
        let backend = Arc::new(MemoryObjectStore::new());
        let store = AssetStore::new(backend.clone());
        store
            .store(Bytes::from_static(b"glb"), "model/gltf-binary", AssetCategory::Model, "p/m.glb")
            .await
            .unwrap();

        store.delete("p/m.glb", AssetCategory::Model).await;
        assert!(backend.get(Container::ProductModels, "p/m.glb").is_none());
    }
}
