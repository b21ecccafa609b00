//! Shared state handed to every handler.

use crate::services::{
    asset_pipeline::AssetPipeline, asset_store::AssetStore, catalog_service::CatalogService,
    local_store::LocalObjectStore,
};
use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

#[derive(Clone)]
pub struct AppState {
    /// Pipeline for product image and model batches.
    pub products: AssetPipeline,

    /// Pipeline for CMS content images.
    pub content: AssetPipeline,

    pub catalog: CatalogService,

    /// Local backend, used directly for serving and listing objects.
    pub objects: LocalObjectStore,
}

impl AppState {
    /// Wire every service around one pool and one local object store.
    pub fn new(
        db: Arc<SqlitePool>,
        storage_dir: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        let objects = LocalObjectStore::new(db.clone(), storage_dir, public_base_url);
        let store = AssetStore::new(Arc::new(objects.clone()));
        Self {
            products: AssetPipeline::new(store.clone()),
            content: AssetPipeline::for_content(store),
            catalog: CatalogService::new(db),
            objects,
        }
    }

    pub fn assets(&self) -> &AssetStore {
        self.products.store()
    }
}
