use anyhow::Context;
use bytes::Bytes;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::resources::repo;
use crate::resources::repo_types::{Resource, Upload};
use crate::state::AppState;

pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "txt", "rtf"];

pub struct NewResourceUpload {
    pub name: String,
    pub parent_directory: Option<String>,
    pub categories: Vec<String>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub body: Bytes,
}

/// Extension whitelist check, case-insensitive. Returns the lowercased
/// extension on success.
pub fn validate_extension(file_name: &str) -> Result<String, ApiError> {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
        .ok_or_else(|| ApiError::bad_request("invalid file type: missing extension"))?;

    if !ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::bad_request(format!("invalid file type: .{ext}")));
    }
    Ok(ext)
}

/// Normalize a raw categories field into the canonical tag list. Accepts
/// both plain comma-joined strings and brace-wrapped `{a,b}` literals.
pub fn parse_categories(raw: &str) -> Vec<String> {
    raw.trim()
        .trim_matches(|c| c == '{' || c == '}')
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Store an uploaded resource: stage the bytes, insert the resource and
/// upload rows in one transaction, then commit the file with an atomic
/// rename. An insert failure discards the staged file; a staged file that
/// survives a crash is reclaimed by the hourly sweep.
pub async fn store_resource(
    state: &AppState,
    user_id: Uuid,
    upload: NewResourceUpload,
) -> Result<Resource, ApiError> {
    let id = Uuid::new_v4();
    let ext = validate_extension(&upload.file_name)?;
    let stored_name = format!("{id}.{ext}");
    let relative_path = format!("{}/{}", state.config.uploads_dir, stored_name);
    let now = OffsetDateTime::now_utc();

    state
        .files
        .stage(&stored_name, upload.body.clone())
        .await
        .context("stage upload")?;

    let resource = Resource {
        id,
        name: upload.name,
        parent_url: None,
        parent_directory: upload.parent_directory,
        relative_path: relative_path.clone(),
        download_link: None,
        categories: upload.categories,
        user_id: Some(user_id),
        created_at: now,
    };
    let upload_row = Upload {
        id: Uuid::new_v4(),
        file_name: upload.file_name,
        file_path: relative_path,
        file_size: upload.body.len() as i64,
        content_type: upload.content_type,
        user_id,
        created_at: now,
    };

    let insert = async {
        let mut tx = state.db.begin().await.context("begin upload tx")?;
        repo::insert_resource_tx(&mut tx, &resource).await?;
        repo::insert_upload_tx(&mut tx, &upload_row).await?;
        tx.commit().await.context("commit upload tx")?;
        Ok::<_, anyhow::Error>(())
    };

    if let Err(e) = insert.await {
        if let Err(cleanup) = state.files.discard(&stored_name).await {
            warn!(error = %cleanup, file = %stored_name, "failed to discard staged upload");
        }
        return Err(e.into());
    }

    state
        .files
        .commit(&stored_name)
        .await
        .context("commit upload file")?;

    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whitelisted_extensions_pass_case_insensitively() {
        assert_eq!(validate_extension("resume.pdf").unwrap(), "pdf");
        assert_eq!(validate_extension("Resume.PDF").unwrap(), "pdf");
        assert_eq!(validate_extension("notes.DocX").unwrap(), "docx");
        assert_eq!(validate_extension("a.b.txt").unwrap(), "txt");
    }

    #[test]
    fn other_extensions_are_rejected() {
        let err = validate_extension("photo.jpg").unwrap_err();
        assert!(err.to_string().contains("invalid file type"));
        assert!(validate_extension("script.sh").is_err());
        assert!(validate_extension("no-extension").is_err());
        assert!(validate_extension("trailing-dot.").is_err());
    }

    #[test]
    fn categories_parse_from_both_encodings() {
        assert_eq!(parse_categories("math,science"), vec!["math", "science"]);
        assert_eq!(parse_categories("{math, science}"), vec!["math", "science"]);
        assert_eq!(parse_categories(" math , , science "), vec!["math", "science"]);
        assert!(parse_categories("").is_empty());
        assert!(parse_categories("{}").is_empty());
    }
}
