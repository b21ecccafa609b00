//! Upload pipeline for one entity's batch of files.
//!
//! A batch moves through typed stages, each consuming the previous one:
//!
//! ```text
//! Partitioned --name()--> Named --store_siblings()--> SiblingsStored --finish()--> PipelineOutcome
//! ```
//!
//! - **Partitioned**: every file classified into a `FileRole`.
//! - **Named**: every filename sanitized into one shared `NameMapping`, and
//!   the manifest's references checked against it.
//! - **SiblingsStored**: every non-manifest file uploaded.
//! - **PipelineOutcome**: manifest rewritten and uploaded last.
//!
//! A storage failure aborts the remaining stages. Files uploaded before the
//! failure stay in the store; nothing is rolled back.

use crate::{
    models::{
        asset::StoredFile,
        name_mapping::NameMapping,
        upload::{FileRole, UploadedFile},
    },
    services::{
        asset_store::AssetStore,
        object_store::{AssetCategory, StorageError},
        rewriter::{self, ManifestParseError},
        sanitizer::{extension_of, sanitize_filename},
    },
};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, info};

const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "webp", "gif", "svg", "avif", "bmp"];

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("uploaded file has no usable filename")]
    EmptyFilename,
    #[error("unsupported file `{name}` ({content_type})")]
    UnsupportedFile { name: String, content_type: String },
    #[error("file `{0}` appears more than once in the upload")]
    DuplicateFilename(String),
    #[error("files `{first}` and `{second}` both sanitize to `{sanitized}`")]
    NameCollision {
        first: String,
        second: String,
        sanitized: String,
    },
    #[error("only one glTF manifest may be uploaded at a time")]
    MultipleManifests,
    #[error(transparent)]
    InvalidManifest(#[from] ManifestParseError),
    #[error("manifest references `{0}`, which is not part of the upload")]
    MissingReference(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// True for problems with the uploaded input (as opposed to storage).
    pub fn is_validation(&self) -> bool {
        !matches!(self, PipelineError::Storage(_))
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Assign a role from the file extension, falling back to the declared MIME
/// type when there is no extension.
pub fn classify(name: &str, content_type: &str) -> PipelineResult<FileRole> {
    if name.trim().is_empty() {
        return Err(PipelineError::EmptyFilename);
    }

    let role = match extension_of(name).as_deref() {
        Some("gltf") => Some(FileRole::ModelManifest),
        Some("glb" | "bin") => Some(FileRole::ModelBinary),
        Some(ext) if IMAGE_EXTENSIONS.contains(&ext) => Some(FileRole::Image),
        Some(_) => None,
        None => {
            let mime = content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            match mime.as_str() {
                "model/gltf+json" => Some(FileRole::ModelManifest),
                "model/gltf-binary" => Some(FileRole::ModelBinary),
                m if m.starts_with("image/") => Some(FileRole::Image),
                _ => None,
            }
        }
    };

    role.ok_or_else(|| PipelineError::UnsupportedFile {
        name: name.to_string(),
        content_type: content_type.to_string(),
    })
}

/// Key of `name` under `entity_id`; an empty entity stores at the
/// container root.
fn destination(entity_id: &str, name: &str) -> String {
    if entity_id.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", entity_id, name)
    }
}

#[derive(Debug)]
struct ClassifiedFile {
    role: FileRole,
    file: UploadedFile,
}

#[derive(Debug)]
struct NamedFile {
    role: FileRole,
    sanitized: String,
    file: UploadedFile,
}

/// Stage 1: files classified into roles.
#[derive(Debug)]
pub struct Partitioned {
    entity_id: String,
    files: Vec<ClassifiedFile>,
}

impl Partitioned {
    /// Classify every file. Unknown files fail the whole batch. When the
    /// batch carries a manifest, images become its textures.
    pub fn new(entity_id: impl Into<String>, files: Vec<UploadedFile>) -> PipelineResult<Self> {
        let mut classified = files
            .into_iter()
            .map(|file| {
                let role = classify(&file.original_name, &file.content_type)?;
                Ok(ClassifiedFile { role, file })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        let manifests = classified
            .iter()
            .filter(|f| f.role == FileRole::ModelManifest)
            .count();
        if manifests > 1 {
            return Err(PipelineError::MultipleManifests);
        }
        if manifests == 1 {
            for f in classified.iter_mut() {
                if f.role == FileRole::Image {
                    f.role = FileRole::ModelAuxiliary;
                }
            }
        }

        Ok(Self {
            entity_id: entity_id.into(),
            files: classified,
        })
    }

    /// `(role, original name)` of every file in the batch.
    pub fn entries(&self) -> impl Iterator<Item = (FileRole, &str)> + '_ {
        self.files
            .iter()
            .map(|f| (f.role, f.file.original_name.as_str()))
    }

    /// Stage 2: sanitize every name into one shared mapping.
    pub fn name(self) -> PipelineResult<Named> {
        let mut mapping = NameMapping::new();
        let mut siblings = Vec::new();
        let mut manifest = None;

        for ClassifiedFile { role, file } in self.files {
            if mapping.get(&file.original_name).is_some() {
                return Err(PipelineError::DuplicateFilename(file.original_name));
            }
            let sanitized = sanitize_filename(&file.original_name);
            if sanitized.is_empty() {
                return Err(PipelineError::EmptyFilename);
            }
            if let Some(first) = mapping.original_of(&sanitized) {
                return Err(PipelineError::NameCollision {
                    first: first.to_string(),
                    second: file.original_name.clone(),
                    sanitized,
                });
            }
            mapping.insert(file.original_name.clone(), sanitized.clone());

            let named = NamedFile {
                role,
                sanitized,
                file,
            };
            match role {
                FileRole::ModelManifest => manifest = Some(named),
                FileRole::Image | FileRole::ModelBinary | FileRole::ModelAuxiliary => {
                    siblings.push(named)
                }
            }
        }

        if let Some(manifest) = &manifest {
            for uri in rewriter::referenced_uris(&manifest.file.data)? {
                if !mapping.knows(&uri) {
                    return Err(PipelineError::MissingReference(uri));
                }
            }
        }

        Ok(Named {
            entity_id: self.entity_id,
            siblings,
            manifest,
            mapping,
        })
    }
}

/// Stage 2 output: names fixed, nothing stored yet.
#[derive(Debug)]
pub struct Named {
    entity_id: String,
    siblings: Vec<NamedFile>,
    manifest: Option<NamedFile>,
    mapping: NameMapping,
}

impl Named {
    pub fn mapping(&self) -> &NameMapping {
        &self.mapping
    }

    /// Stage 3: upload every non-manifest file. Uploads run concurrently
    /// and are awaited together.
    pub async fn store_siblings(self, pipeline: &AssetPipeline) -> PipelineResult<SiblingsStored> {
        debug!(
            entity_id = %self.entity_id,
            names = self.mapping().len(),
            renamed = self.mapping().changed().count(),
            "filenames resolved"
        );
        let entity_id = self.entity_id;
        let uploads = self.siblings.into_iter().map(|named| {
            let key = destination(&entity_id, &named.sanitized);
            pipeline.store_file(named, key)
        });
        let stored = try_join_all(uploads).await?;

        Ok(SiblingsStored {
            entity_id,
            manifest: self.manifest,
            mapping: self.mapping,
            stored,
        })
    }
}

/// Stage 3 output: every sibling durably stored.
#[derive(Debug)]
pub struct SiblingsStored {
    entity_id: String,
    manifest: Option<NamedFile>,
    mapping: NameMapping,
    stored: Vec<StoredFile>,
}

impl SiblingsStored {
    /// Stage 4: rewrite and upload the manifest, if any.
    pub async fn finish(self, pipeline: &AssetPipeline) -> PipelineResult<PipelineOutcome> {
        let mut stored = self.stored;

        if let Some(mut manifest) = self.manifest {
            let original_len = manifest.file.data.len();
            manifest.file.data = rewriter::rewrite_manifest(manifest.file.data, &self.mapping);
            debug!(
                entity_id = %self.entity_id,
                manifest = %manifest.sanitized,
                original_len,
                rewritten_len = manifest.file.data.len(),
                "manifest references rewritten"
            );
            let key = destination(&self.entity_id, &manifest.sanitized);
            stored.push(pipeline.store_file(manifest, key).await?);
        }

        let mut files: BTreeMap<FileRole, Vec<StoredFile>> = BTreeMap::new();
        for file in stored {
            files.entry(file.role).or_default().push(file);
        }

        Ok(PipelineOutcome {
            files,
            mapping: self.mapping,
        })
    }
}

/// Everything a batch stored, grouped by role.
#[derive(Serialize, Debug, Clone)]
pub struct PipelineOutcome {
    pub files: BTreeMap<FileRole, Vec<StoredFile>>,
    pub mapping: NameMapping,
}

impl PipelineOutcome {
    pub fn entries(&self, role: FileRole) -> &[StoredFile] {
        self.files.get(&role).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn manifest(&self) -> Option<&StoredFile> {
        self.entries(FileRole::ModelManifest).first()
    }

    /// The file a model is opened from: the manifest, else the `.glb`.
    pub fn model_entry(&self) -> Option<&StoredFile> {
        self.manifest().or_else(|| {
            self.entries(FileRole::ModelBinary)
                .iter()
                .find(|f| extension_of(&f.sanitized_name).as_deref() == Some("glb"))
        })
    }

    pub fn all(&self) -> impl Iterator<Item = &StoredFile> {
        self.files.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.files.values().map(Vec::len).sum()
    }
}

/// Sequences sanitize → upload → rewrite → upload-manifest for a batch.
#[derive(Clone)]
pub struct AssetPipeline {
    store: AssetStore,
    image_category: AssetCategory,
}

impl AssetPipeline {
    /// Pipeline for product batches: images go to `product-images`.
    pub fn new(store: AssetStore) -> Self {
        Self {
            store,
            image_category: AssetCategory::Image,
        }
    }

    /// Pipeline for CMS content: images go to `content-images`.
    pub fn for_content(store: AssetStore) -> Self {
        Self {
            store,
            image_category: AssetCategory::Content,
        }
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    /// Category (and so container) a file of `role` is stored in.
    pub fn category_for(&self, role: FileRole) -> AssetCategory {
        match role {
            FileRole::Image => self.image_category,
            FileRole::ModelBinary | FileRole::ModelManifest | FileRole::ModelAuxiliary => {
                AssetCategory::Model
            }
        }
    }

    /// Run the whole pipeline for `entity_id`.
    pub async fn process(
        &self,
        entity_id: &str,
        files: Vec<UploadedFile>,
    ) -> PipelineResult<PipelineOutcome> {
        self.run(Partitioned::new(entity_id, files)?).await
    }

    /// Run an already partitioned batch through the remaining stages.
    pub async fn run(&self, batch: Partitioned) -> PipelineResult<PipelineOutcome> {
        let entity_id = batch.entity_id.clone();
        info!(entity_id = %entity_id, files = batch.files.len(), "processing upload batch");

        let outcome = batch
            .name()?
            .store_siblings(self)
            .await?
            .finish(self)
            .await?;

        info!(entity_id = %entity_id, stored = outcome.len(), "upload batch stored");
        Ok(outcome)
    }

    async fn store_file(&self, named: NamedFile, key: String) -> PipelineResult<StoredFile> {
        let NamedFile {
            role,
            sanitized,
            file,
        } = named;
        let size_bytes = file.data.len();
        let asset = self
            .store
            .store(file.data, &file.content_type, self.category_for(role), &key)
            .await?;

        Ok(StoredFile {
            role,
            original_name: file.original_name,
            sanitized_name: sanitized,
            content_type: file.content_type,
            size_bytes,
            path: asset.path,
            url: asset.url,
        })
    }
}
