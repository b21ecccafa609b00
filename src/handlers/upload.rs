//! Multipart helpers shared by the upload handlers.

use crate::{errors::AppError, models::upload::UploadedFile};
use axum::extract::Multipart;

/// Collect every file field of a multipart form.
///
/// Fields without a filename (plain form values) are skipped. Field names
/// are not significant.
pub async fn read_files(mut multipart: Multipart) -> Result<Vec<UploadedFile>, AppError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(format!("Failed to read multipart: {}", e)))?
    {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(format!("Failed to read file data: {}", e)))?;

        files.push(UploadedFile::new(filename, content_type, data));
    }

    if files.is_empty() {
        return Err(AppError::bad_request("No file provided"));
    }
    Ok(files)
}
