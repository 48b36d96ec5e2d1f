use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// Job posting. `job_type` is the enum-like free string the original schema
/// uses (Full-time, Part-time, Contract); no ownership link to a user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Job {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub job_type: Option<String>,
    pub salary: Option<String>,
    pub created_at: OffsetDateTime,
}
