//! Catalog rows that point products at their stored assets.

use super::upload::FileRole;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An image attached to a product.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,

    /// Key inside the `product-images` container.
    pub path: String,

    /// Public URL of the stored image.
    pub url: String,

    pub created_at: DateTime<Utc>,
}

/// The 3D model of a product. At most one per product.
///
/// `path`/`url` address the entry file: the manifest when the model was
/// uploaded as glTF, otherwise the `.glb` binary.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ProductModel {
    pub id: Uuid,
    pub product_id: Uuid,
    pub path: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Every object stored for a model, the entry file included.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ProductModelFile {
    pub id: Uuid,
    pub model_id: Uuid,
    pub role: FileRole,
    pub path: String,
    pub url: String,
}

/// A model row together with its files, as returned by the API.
#[derive(Serialize, Clone, Debug)]
pub struct ProductModelDetail {
    #[serde(flatten)]
    pub model: ProductModel,
    pub files: Vec<ProductModelFile>,
}
