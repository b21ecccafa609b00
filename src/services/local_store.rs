//! LocalObjectStore: `ObjectStore` backed by local disk for payloads and
//! SQLite for object metadata. Payloads are sharded beneath
//! `base_path/{container}/{shard}/{shard}/{key}`.

use crate::{
    models::object::Object,
    services::object_store::{Container, ObjectStore, StorageError, StorageResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Clone, Debug)]
pub struct ListObjectsParams {
    pub prefix: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: usize,
}

#[derive(Debug)]
pub struct ListObjectsResult {
    pub objects: Vec<Object>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Disk + SQLite object store.
///
/// Writes go to a temp file, are fsynced and renamed into place, then the
/// metadata row is upserted, so a key always resolves to a complete payload.
/// Overwrites are last-write-wins.
#[derive(Clone)]
pub struct LocalObjectStore {
    /// Shared SQLite connection pool used for metadata operations.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// Prefix of the public URLs handed out for stored objects.
    pub public_base_url: String,
}

impl LocalObjectStore {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Create the directory of every container.
    pub async fn ensure_containers(&self) -> StorageResult<()> {
        for container in Container::ALL {
            fs::create_dir_all(self.container_root(container)).await?;
        }
        Ok(())
    }

    /// Public URL an object at `key` is served from.
    pub fn public_url(&self, container: Container, key: &str) -> String {
        format!(
            "{}/assets/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            container,
            key
        )
    }

    /// Rejects empty or overlong keys, absolute keys, `..` and control
    /// characters.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        let invalid = key.is_empty()
            || key.len() > MAX_OBJECT_KEY_LEN
            || key.starts_with('/')
            || key.ends_with('/')
            || key.contains("..")
            || key
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
        if invalid {
            return Err(StorageError::InvalidObjectKey(key.to_string()));
        }
        Ok(())
    }

    fn container_root(&self, container: Container) -> PathBuf {
        self.base_path.join(container.as_str())
    }

    /// Two-level shard directories from MD5(container/key).
    fn object_shards(container: Container, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", container, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, container: Container, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(container, key);
        let mut path = self.container_root(container);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_object(&self, container: Container, key: &str) -> StorageResult<Object> {
        sqlx::query_as::<_, Object>(
            "SELECT id, container, key, filename, content_type, size_bytes, etag, last_modified
             FROM objects
             WHERE container = ? AND key = ?",
        )
        .bind(container.as_str())
        .bind(key)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => StorageError::ObjectNotFound {
                container: container.to_string(),
                key: key.to_string(),
            },
            other => StorageError::Sqlx(other),
        })
    }

    /// Stream an object to disk and upsert its metadata.
    pub async fn upload_object_stream<S>(
        &self,
        container: Container,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<Object>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        self.ensure_key_safe(key)?;

        let file_path = self.object_path(container, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: i64 = 0;
        let mut digest = Context::new();
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&file_path).await?;
                fs::rename(&tmp_path, &file_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }

        let filename = key.rsplit('/').next().unwrap_or(key).to_string();
        let etag = format!("{:x}", digest.compute());

        let object = sqlx::query_as::<_, Object>(
            r#"
            INSERT INTO objects (
                id, container, key, filename, content_type, size_bytes, etag, last_modified
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(container, key) DO UPDATE SET
                filename = excluded.filename,
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified
            RETURNING id, container, key, filename, content_type, size_bytes, etag, last_modified
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(container.as_str())
        .bind(key)
        .bind(&filename)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await
        .map_err(StorageError::Sqlx)?;

        debug!(%container, key, size_bytes, etag = %etag, "stored object");
        Ok(object)
    }

    /// Metadata plus an open file handle for streaming the payload out.
    pub async fn get_object_reader(
        &self,
        container: Container,
        key: &str,
    ) -> StorageResult<(Object, File)> {
        self.ensure_key_safe(key)?;
        let object = self.fetch_object(container, key).await?;

        let file = File::open(self.object_path(container, key))
            .await
            .map_err(|err| {
                if err.kind() == ErrorKind::NotFound {
                    StorageError::ObjectNotFound {
                        container: container.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    StorageError::Io(err)
                }
            })?;

        Ok((object, file))
    }

    pub async fn get_object_metadata(
        &self,
        container: Container,
        key: &str,
    ) -> StorageResult<Object> {
        self.ensure_key_safe(key)?;
        self.fetch_object(container, key).await
    }

    /// List objects in key order, optionally under `prefix`, resuming after
    /// the continuation token (the last key of the previous page).
    pub async fn list_objects(
        &self,
        container: Container,
        params: ListObjectsParams,
    ) -> StorageResult<ListObjectsResult> {
        let max_keys = params.max_keys.clamp(1, 1000);
        let fetch_limit = max_keys + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(
            "SELECT id, container, key, filename, content_type, size_bytes, etag, last_modified \
             FROM objects WHERE container = ",
        );
        builder.push_bind(container.as_str());

        if let Some(prefix) = &params.prefix {
            builder.push(" AND substr(key, 1, length(");
            builder.push_bind(prefix.clone());
            builder.push(")) = ");
            builder.push_bind(prefix.clone());
        }

        if let Some(token) = &params.continuation_token {
            builder.push(" AND key > ");
            builder.push_bind(token.clone());
        }

        builder.push(" ORDER BY key ASC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut objects: Vec<Object> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut is_truncated = false;
        let mut next_continuation_token = None;
        if objects.len() == fetch_limit {
            objects.pop();
            next_continuation_token = objects.last().map(|obj| obj.key.clone());
            is_truncated = true;
        }

        Ok(ListObjectsResult {
            objects,
            is_truncated,
            next_continuation_token,
        })
    }

    /// Remove an object's metadata and payload.
    ///
    /// Returns `ObjectNotFound` when no metadata row exists. A payload that
    /// is already gone from disk is not an error.
    pub async fn remove_object(&self, container: Container, key: &str) -> StorageResult<()> {
        self.ensure_key_safe(key)?;

        let result = sqlx::query("DELETE FROM objects WHERE container = ? AND key = ?")
            .bind(container.as_str())
            .bind(key)
            .execute(&*self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ObjectNotFound {
                container: container.to_string(),
                key: key.to_string(),
            });
        }

        let file_path = self.object_path(container, key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(StorageError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            let root = self.container_root(container);
            self.prune_empty_dirs(parent, &root).await;
        }

        info!(%container, key, "deleted object");
        Ok(())
    }

    /// Remove empty directories from `start` up to, not including, `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put_object(
        &self,
        container: Container,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String> {
        let stream = futures::stream::once(async move { Ok::<_, io::Error>(data) });
        self.upload_object_stream(container, key, Some(content_type.to_string()), stream)
            .await?;
        Ok(self.public_url(container, key))
    }

    async fn delete_object(&self, container: Container, key: &str) -> StorageResult<()> {
        self.remove_object(container, key).await
    }
}
