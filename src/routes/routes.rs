//! Defines routes for product asset, content and object-serving endpoints.
//!
//! ## Structure
//! - **Product images**
//!   - `POST   /products/{product_id}/images`: upload one or more images
//!   - `GET    /products/{product_id}/images`: list image rows
//!   - `DELETE /products/{product_id}/images/{image_id}`: delete row and object
//!
//! - **Product model**
//!   - `PUT    /products/{product_id}/model`: upload (replace) the 3D model
//!   - `GET    /products/{product_id}/model`: model row and files
//!   - `DELETE /products/{product_id}/model`: delete rows and objects
//!
//! - **Content images**
//!   - `POST   /content/images`: upload (supports `?folder=`)
//!   - `GET    /content/images`: list (supports prefix, max-keys, continuation-token)
//!   - `DELETE /content/images/{*path}`: best-effort delete
//!
//! - **Public assets**
//!   - `GET|HEAD /assets/{container}/{*key}`: serve a stored object
//!
//! The wildcard segments allow nested keys like `{product_id}/scene.gltf`.

use crate::{
    handlers::{
        asset_handlers::{get_asset, head_asset},
        content_handlers::{delete_content_image, list_content_images, upload_content_images},
        health_handlers::{healthz, readyz},
        product_handlers::{
            delete_product_image, delete_product_model, get_product_model, list_product_images,
            put_product_model, upload_product_images,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get},
};

/// Build the router. Every handler shares `AppState`; request bodies are
/// capped at `max_upload_bytes`.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Product assets
        .route(
            "/products/{product_id}/images",
            get(list_product_images).post(upload_product_images),
        )
        .route(
            "/products/{product_id}/images/{image_id}",
            delete(delete_product_image),
        )
        .route(
            "/products/{product_id}/model",
            get(get_product_model)
                .put(put_product_model)
                .delete(delete_product_model),
        )
        // Content images
        .route(
            "/content/images",
            get(list_content_images).post(upload_content_images),
        )
        .route("/content/images/{*path}", delete(delete_content_image))
        // Public asset URLs
        .route("/assets/{container}/{*key}", get(get_asset).head(head_asset))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
        response::Response,
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tempfile::{TempDir, tempdir};
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "catalog-assets-test-boundary";

    async fn app() -> (Router, TempDir) {
        let dir = tempdir().unwrap();
        let pool = db::connect_in_memory().await.unwrap();
        let state = AppState::new(Arc::new(pool), dir.path(), "http://assets.test");
        state.objects.ensure_containers().await.unwrap();
        (routes(1024 * 1024).with_state(state), dir)
    }

    fn multipart(method: &str, uri: &str, files: &[(&str, &str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, content_type, data) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; \
                     filename=\"{name}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(method)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn body_bytes(resp: Response) -> Vec<u8> {
        to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()
    }

    async fn body_json(resp: Response) -> Value {
        serde_json::from_slice(&body_bytes(resp).await).unwrap()
    }

    /// Path part of a public URL, as routed by this service.
    fn local_path(url: &str) -> &str {
        url.trim_start_matches("http://assets.test")
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let (app, _dir) = app().await;
        let resp = send(&app, request("GET", "/healthz")).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn readyz_checks_db_and_disk() {
        let (app, _dir) = app().await;
        let resp = send(&app, request("GET", "/readyz")).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["checks"]["sqlite"]["ok"], true);
        assert_eq!(json["checks"]["containers"]["ok"], true);
    }

    #[tokio::test]
    async fn product_images_upload_list_and_delete() {
        let (app, _dir) = app().await;
        let product = Uuid::new_v4();
        let uri = format!("/products/{product}/images");

        let resp = send(
            &app,
            multipart(
                "POST",
                &uri,
                &[
                    ("Front View.JPG", "image/jpeg", b"front"),
                    ("side.png", "image/png", b"side"),
                ],
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created = body_json(resp).await;
        let rows = created.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["path"], format!("{product}/Front-View.jpg"));

        let url = rows[0]["url"].as_str().unwrap().to_string();
        let resp = send(&app, request("GET", local_path(&url))).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");
        assert_eq!(body_bytes(resp).await, b"front");

        let listed = body_json(send(&app, request("GET", &uri)).await).await;
        assert_eq!(listed.as_array().unwrap().len(), 2);

        let image_id = rows[0]["id"].as_str().unwrap();
        let resp = send(&app, request("DELETE", &format!("{uri}/{image_id}"))).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = send(&app, request("GET", local_path(&url))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = send(&app, request("DELETE", &format!("{uri}/{image_id}"))).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn image_endpoint_rejects_model_files() {
        let (app, _dir) = app().await;
        let uri = format!("/products/{}/images", Uuid::new_v4());
        let resp = send(
            &app,
            multipart("POST", &uri, &[("m.glb", "model/gltf-binary", b"glTF")]),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let json = body_json(resp).await;
        assert_eq!(json["status"], 400);
    }

    #[tokio::test]
    async fn gltf_model_is_rewritten_and_replacement_cleans_up() {
        let (app, _dir) = app().await;
        let product = Uuid::new_v4();
        let uri = format!("/products/{product}/model");
        let manifest = br#"{"asset":{"version":"2.0"},"buffers":[{"uri":"Valve%20Body.bin","byteLength":3}],"images":[{"uri":"Brushed Steel.PNG"}]}"#;

        let resp = send(
            &app,
            multipart(
                "PUT",
                &uri,
                &[
                    ("Valve Body.gltf", "model/gltf+json", manifest),
                    ("Valve Body.bin", "application/octet-stream", b"bin"),
                    ("Brushed Steel.PNG", "image/png", b"png"),
                ],
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
        let model = body_json(resp).await;
        assert_eq!(model["path"], format!("{product}/Valve-Body.gltf"));
        assert_eq!(model["files"].as_array().unwrap().len(), 3);

        let manifest_url = model["url"].as_str().unwrap().to_string();
        let stored = body_bytes(send(&app, request("GET", local_path(&manifest_url))).await).await;
        let text = String::from_utf8(stored).unwrap();
        assert!(text.contains(r#""uri":"Valve-Body.bin""#));
        assert!(text.contains(r#""uri":"Brushed-Steel.png""#));

        let bin_path = format!("/assets/product-models/{product}/Valve-Body.bin");
        assert_eq!(send(&app, request("HEAD", &bin_path)).await.status(), StatusCode::OK);

        let resp = send(
            &app,
            multipart("PUT", &uri, &[("Valve Body.glb", "model/gltf-binary", b"glb")]),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);

        assert_eq!(
            send(&app, request("GET", local_path(&manifest_url))).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            send(&app, request("GET", &bin_path)).await.status(),
            StatusCode::NOT_FOUND
        );

        let current = body_json(send(&app, request("GET", &uri)).await).await;
        assert_eq!(current["path"], format!("{product}/Valve-Body.glb"));

        let resp = send(&app, request("DELETE", &uri)).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            send(&app, request("GET", &uri)).await.status(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn model_with_dangling_reference_is_rejected() {
        let (app, _dir) = app().await;
        let uri = format!("/products/{}/model", Uuid::new_v4());
        let resp = send(
            &app,
            multipart(
                "PUT",
                &uri,
                &[("scene.gltf", "model/gltf+json", br#"{"buffers":[{"uri":"missing.bin"}]}"#)],
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn content_images_upload_list_and_delete() {
        let (app, _dir) = app().await;

        let resp = send(
            &app,
            multipart(
                "POST",
                "/content/images?folder=Spring%20Sale",
                &[("Hero Banner.jpg", "image/jpeg", b"hero")],
            ),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let stored = body_json(resp).await;
        assert_eq!(stored[0]["path"], "Spring-Sale/Hero-Banner.jpg");

        let listed = body_json(send(&app, request("GET", "/content/images?prefix=Spring-Sale/")).await).await;
        assert_eq!(listed["images"].as_array().unwrap().len(), 1);
        assert_eq!(listed["is_truncated"], false);

        let resp = send(&app, request("DELETE", "/content/images/Spring-Sale/Hero-Banner.jpg")).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = send(&app, request("DELETE", "/content/images/never/stored.png")).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let listed = body_json(send(&app, request("GET", "/content/images")).await).await;
        assert!(listed["images"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_container_is_rejected() {
        let (app, _dir) = app().await;
        let resp = send(&app, request("GET", "/assets/other/x.png")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
