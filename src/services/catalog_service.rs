//! CatalogService: rows linking products to their stored images and models.
//!
//! This layer never talks to the object store. Callers store files first,
//! then record the returned paths/URLs here, then clean up replaced objects.

use crate::models::{
    asset::StoredFile,
    catalog::{ProductImage, ProductModel, ProductModelDetail, ProductModelFile},
};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct CatalogService {
    pub db: Arc<SqlitePool>,
}

impl CatalogService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Record stored images for a product, in one transaction. Re-uploading
    /// a path the product already has refreshes that row instead of adding
    /// a second one.
    pub async fn add_product_images(
        &self,
        product_id: Uuid,
        images: &[StoredFile],
    ) -> Result<Vec<ProductImage>, sqlx::Error> {
        let mut tx = self.db.begin().await?;
        let mut rows = Vec::with_capacity(images.len());
        for image in images {
            let row = sqlx::query_as::<_, ProductImage>(
                "INSERT INTO product_images (id, product_id, path, url, created_at)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(product_id, path) DO UPDATE SET url = excluded.url
                 RETURNING id, product_id, path, url, created_at",
            )
            .bind(Uuid::new_v4())
            .bind(product_id)
            .bind(&image.path)
            .bind(&image.url)
            .bind(Utc::now())
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }
        tx.commit().await?;
        Ok(rows)
    }

    pub async fn list_product_images(
        &self,
        product_id: Uuid,
    ) -> Result<Vec<ProductImage>, sqlx::Error> {
        sqlx::query_as::<_, ProductImage>(
            "SELECT id, product_id, path, url, created_at
             FROM product_images WHERE product_id = ?
             ORDER BY created_at ASC, path ASC",
        )
        .bind(product_id)
        .fetch_all(&*self.db)
        .await
    }

    /// Delete one image row, returning it so its object can be removed.
    pub async fn delete_product_image(
        &self,
        product_id: Uuid,
        image_id: Uuid,
    ) -> Result<Option<ProductImage>, sqlx::Error> {
        sqlx::query_as::<_, ProductImage>(
            "DELETE FROM product_images WHERE id = ? AND product_id = ?
             RETURNING id, product_id, path, url, created_at",
        )
        .bind(image_id)
        .bind(product_id)
        .fetch_optional(&*self.db)
        .await
    }

    pub async fn get_product_model(
        &self,
        product_id: Uuid,
    ) -> Result<Option<ProductModelDetail>, sqlx::Error> {
        let mut conn = self.db.acquire().await?;
        let Some(model) = sqlx::query_as::<_, ProductModel>(
            "SELECT id, product_id, path, url, created_at
             FROM product_models WHERE product_id = ?",
        )
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let files = sqlx::query_as::<_, ProductModelFile>(
            "SELECT id, model_id, role, path, url
             FROM product_model_files WHERE model_id = ? ORDER BY path ASC",
        )
        .bind(model.id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(ProductModelDetail { model, files }))
    }

    /// Make `entry` and `files` the product's model, replacing any previous
    /// one. Returns the new model and the files of the replaced one.
    ///
    /// The model row is upserted first, so the transaction holds the write
    /// lock before it reads anything; concurrent replaces for one product
    /// run one after the other and the last one wins.
    pub async fn replace_product_model(
        &self,
        product_id: Uuid,
        entry: &StoredFile,
        files: &[StoredFile],
    ) -> Result<(ProductModelDetail, Vec<ProductModelFile>), sqlx::Error> {
        let mut tx = self.db.begin().await?;

        let model = sqlx::query_as::<_, ProductModel>(
            "INSERT INTO product_models (id, product_id, path, url, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(product_id) DO UPDATE SET
                path = excluded.path,
                url = excluded.url,
                created_at = excluded.created_at
             RETURNING id, product_id, path, url, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(&entry.path)
        .bind(&entry.url)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        let previous = sqlx::query_as::<_, ProductModelFile>(
            "DELETE FROM product_model_files WHERE model_id = ?
             RETURNING id, model_id, role, path, url",
        )
        .bind(model.id)
        .fetch_all(&mut *tx)
        .await?;

        let mut rows = Vec::with_capacity(files.len());
        for file in files {
            let row = sqlx::query_as::<_, ProductModelFile>(
                "INSERT INTO product_model_files (id, model_id, role, path, url)
                 VALUES (?, ?, ?, ?, ?)
                 RETURNING id, model_id, role, path, url",
            )
            .bind(Uuid::new_v4())
            .bind(model.id)
            .bind(file.role)
            .bind(&file.path)
            .bind(&file.url)
            .fetch_one(&mut *tx)
            .await?;
            rows.push(row);
        }
        tx.commit().await?;

        rows.sort_by(|a, b| a.path.cmp(&b.path));
        Ok((ProductModelDetail { model, files: rows }, previous))
    }

    /// Delete a product's model rows, returning what was removed.
    pub async fn delete_product_model(
        &self,
        product_id: Uuid,
    ) -> Result<Option<ProductModelDetail>, sqlx::Error> {
        let mut tx = self.db.begin().await?;

        let mut files = sqlx::query_as::<_, ProductModelFile>(
            "DELETE FROM product_model_files
             WHERE model_id IN (SELECT id FROM product_models WHERE product_id = ?)
             RETURNING id, model_id, role, path, url",
        )
        .bind(product_id)
        .fetch_all(&mut *tx)
        .await?;

        let model = sqlx::query_as::<_, ProductModel>(
            "DELETE FROM product_models WHERE product_id = ?
             RETURNING id, product_id, path, url, created_at",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(model.map(|model| ProductModelDetail { model, files }))
    }
}
