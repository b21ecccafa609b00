//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness: DB connectivity, disk I/O, container directories

use crate::{
    services::{local_store::LocalObjectStore, object_store::Container},
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness probe. Never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// HTTP 200 when every check passes, HTTP 503 otherwise. The body lists
/// each check with its error, if any.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let objects = &state.objects;

    let mut checks = BTreeMap::new();
    checks.insert("sqlite", check_sqlite(objects).await);
    checks.insert("disk", check_disk(objects).await);
    checks.insert("containers", check_containers(objects).await);

    let overall_ok = checks.values().all(|c| c.ok);
    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn check_sqlite(objects: &LocalObjectStore) -> CheckStatus {
    match sqlx::query_scalar::<_, i64>("SELECT 1")
        .fetch_one(&*objects.db)
        .await
    {
        Ok(1) => CheckStatus::pass(),
        Ok(v) => CheckStatus::fail(format!("unexpected result: {}", v)),
        Err(e) => CheckStatus::fail(format!("error: {}", e)),
    }
}

/// Write, read back and remove a temp file under `base_path`.
async fn check_disk(objects: &LocalObjectStore) -> CheckStatus {
    let tmp_path = objects
        .base_path
        .join(format!(".readyz-{}", Uuid::new_v4()));

    if let Err(e) = fs::write(&tmp_path, b"readyz").await {
        return CheckStatus::fail(format!("could not write tmp file: {}", e));
    }
    let read = fs::read(&tmp_path).await;
    let removed = fs::remove_file(&tmp_path).await;

    match (read, removed) {
        (Ok(bytes), _) if bytes != b"readyz" => CheckStatus::fail("file content mismatch"),
        (Ok(_), Ok(())) => CheckStatus::pass(),
        (Ok(_), Err(e)) => CheckStatus {
            ok: true,
            error: Some(format!("could not remove tmp file: {}", e)),
        },
        (Err(e), _) => CheckStatus::fail(format!("could not read tmp file: {}", e)),
    }
}

async fn check_containers(objects: &LocalObjectStore) -> CheckStatus {
    let mut missing = Vec::new();
    for container in Container::ALL {
        let dir = objects.base_path.join(container.as_str());
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            missing.push(container.as_str());
        }
    }
    if missing.is_empty() {
        CheckStatus::pass()
    } else {
        CheckStatus::fail(format!("missing container directories: {}", missing.join(", ")))
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: BTreeMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn pass() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn fail(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(msg.into()),
        }
    }
}
