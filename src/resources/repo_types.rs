use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Teaching resource backed by a file under the uploads directory.
/// `categories` is the single canonical encoding: an ordered list of tags,
/// serialized to JSON as an array.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Resource {
    pub id: Uuid,
    pub name: String,
    pub parent_url: Option<String>,
    pub parent_directory: Option<String>,
    pub relative_path: String,
    pub download_link: Option<String>,
    pub categories: Vec<String>,
    pub user_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

/// Bookkeeping row for a stored file; one per uploaded resource.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Upload {
    pub id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_size: i64,
    pub content_type: Option<String>,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
}
