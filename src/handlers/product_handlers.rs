//! HTTP handlers for product images and product 3D models.
//!
//! Uploads run through the asset pipeline first; catalog rows are written
//! only after every file is stored. Objects made obsolete by a delete or a
//! model replacement are removed afterwards, best-effort.

use crate::{
    errors::AppError,
    handlers::upload::read_files,
    models::{
        asset::StoredFile,
        catalog::{ProductImage, ProductModelDetail, ProductModelFile},
        upload::FileRole,
    },
    services::{
        asset_pipeline::Partitioned, asset_store::AssetStore, object_store::AssetCategory,
        sanitizer::extension_of,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::collections::HashSet;
use uuid::Uuid;

/// `POST /products/{product_id}/images`
pub async fn upload_product_images(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<Vec<ProductImage>>), AppError> {
    let files = read_files(multipart).await?;
    let batch = Partitioned::new(product_id.to_string(), files)?;
    validate_image_batch(&batch)?;

    let outcome = state.products.run(batch).await?;
    let rows = state
        .catalog
        .add_product_images(product_id, outcome.entries(FileRole::Image))
        .await?;

    tracing::info!(%product_id, images = rows.len(), "product images uploaded");
    Ok((StatusCode::CREATED, Json(rows)))
}

/// `GET /products/{product_id}/images`
pub async fn list_product_images(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<ProductImage>>, AppError> {
    Ok(Json(state.catalog.list_product_images(product_id).await?))
}

/// `DELETE /products/{product_id}/images/{image_id}`
pub async fn delete_product_image(
    State(state): State<AppState>,
    Path((product_id, image_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let image = state
        .catalog
        .delete_product_image(product_id, image_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("image `{}` not found", image_id)))?;

    state.assets().delete(&image.path, AssetCategory::Image).await;
    Ok(StatusCode::NO_CONTENT)
}

/// `PUT /products/{product_id}/model`
///
/// Replaces the product's model. Objects of the previous model that the new
/// upload did not overwrite are deleted afterwards.
pub async fn put_product_model(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<ProductModelDetail>, AppError> {
    let files = read_files(multipart).await?;
    let batch = Partitioned::new(product_id.to_string(), files)?;
    validate_model_batch(&batch)?;

    let outcome = state.products.run(batch).await?;
    let entry = outcome
        .model_entry()
        .ok_or_else(|| AppError::internal("stored model has no entry file"))?;
    let stored: Vec<StoredFile> = outcome.all().cloned().collect();

    let (model, previous) = state
        .catalog
        .replace_product_model(product_id, entry, &stored)
        .await?;

    remove_replaced_files(state.assets(), &previous, &model).await;

    tracing::info!(%product_id, entry = %model.model.path, files = model.files.len(), "product model stored");
    Ok(Json(model))
}

/// `GET /products/{product_id}/model`
pub async fn get_product_model(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ProductModelDetail>, AppError> {
    state
        .catalog
        .get_product_model(product_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("product `{}` has no model", product_id)))
}

/// `DELETE /products/{product_id}/model`
pub async fn delete_product_model(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let removed = state
        .catalog
        .delete_product_model(product_id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("product `{}` has no model", product_id)))?;

    for file in &removed.files {
        state.assets().delete(&file.path, AssetCategory::Model).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Delete `previous` files that `current` does not store at the same path.
async fn remove_replaced_files(
    assets: &AssetStore,
    previous: &[ProductModelFile],
    current: &ProductModelDetail,
) {
    let kept: HashSet<&str> = current.files.iter().map(|f| f.path.as_str()).collect();
    for file in previous.iter().filter(|f| !kept.contains(f.path.as_str())) {
        assets.delete(&file.path, AssetCategory::Model).await;
    }
}

/// Image uploads accept images only.
fn validate_image_batch(batch: &Partitioned) -> Result<(), AppError> {
    if let Some((role, name)) = batch.entries().find(|(role, _)| *role != FileRole::Image) {
        return Err(AppError::bad_request(format!(
            "`{}` is a {} file; only images can be uploaded as product images",
            name, role
        )));
    }
    Ok(())
}

/// A model upload is either one glTF manifest with its buffers and textures,
/// or a single self-contained `.glb`.
fn validate_model_batch(batch: &Partitioned) -> Result<(), AppError> {
    let mut has_manifest = false;
    let mut glb_count = 0;
    for (role, name) in batch.entries() {
        match role {
            FileRole::ModelManifest => has_manifest = true,
            FileRole::ModelBinary if extension_of(name).as_deref() == Some("glb") => {
                glb_count += 1
            }
            FileRole::ModelBinary | FileRole::ModelAuxiliary => {}
            FileRole::Image => {
                return Err(AppError::bad_request(format!(
                    "`{}` is an image; textures can only be uploaded with a glTF manifest",
                    name
                )));
            }
        }
    }

    if has_manifest {
        return Ok(());
    }
    match glb_count {
        0 => Err(AppError::bad_request(
            "a model upload needs a .gltf manifest or a .glb file",
        )),
        1 => {
            if batch.entries().count() > 1 {
                Err(AppError::bad_request(
                    "a .glb model must be uploaded on its own",
                ))
            } else {
                Ok(())
            }
        }
        _ => Err(AppError::bad_request("only one .glb model may be uploaded")),
    }
}
