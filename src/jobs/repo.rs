use anyhow::Context;
use sqlx::PgPool;

use crate::jobs::dto::{CreateJobRequest, UpdateJobRequest};
use crate::jobs::repo_types::Job;
use crate::pagination::{self, Page, PAGE_SIZE};

const JOB_COLUMNS: &str = "id, title, description, location, type, salary, created_at";

/// Paginated search, newest first. Title and location are case-insensitive
/// substring matches, type is exact.
pub async fn search(
    db: &PgPool,
    title: Option<&str>,
    job_type: Option<&str>,
    location: Option<&str>,
    page: i64,
) -> anyhow::Result<Page<Job>> {
    let total_items: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM jobs
        WHERE ($1::text IS NULL OR title ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR type = $2)
          AND ($3::text IS NULL OR location ILIKE '%' || $3 || '%')
        "#,
    )
    .bind(title)
    .bind(job_type)
    .bind(location)
    .fetch_one(db)
    .await
    .context("count jobs")?;

    let total_pages = pagination::total_pages(total_items);
    let page = pagination::clamp_page(page, total_pages);

    let items = sqlx::query_as::<_, Job>(&format!(
        r#"
        SELECT {JOB_COLUMNS}
        FROM jobs
        WHERE ($1::text IS NULL OR title ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR type = $2)
          AND ($3::text IS NULL OR location ILIKE '%' || $3 || '%')
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#
    ))
    .bind(title)
    .bind(job_type)
    .bind(location)
    .bind(PAGE_SIZE)
    .bind(pagination::offset(page))
    .fetch_all(db)
    .await
    .context("fetch jobs")?;

    Ok(Page {
        current_page: page,
        total_pages,
        total_items,
        page_size: PAGE_SIZE,
        items,
    })
}

/// Fetch a single job.
pub async fn get(db: &PgPool, id: i32) -> anyhow::Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
        .bind(id)
        .fetch_optional(db)
        .await
        .context("fetch job")?;
    Ok(job)
}

/// Insert a job and return the stored row.
pub async fn create(db: &PgPool, req: &CreateJobRequest, title: &str) -> anyhow::Result<Job> {
    let job = sqlx::query_as::<_, Job>(&format!(
        r#"
        INSERT INTO jobs (title, description, location, type, salary)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(title)
    .bind(&req.description)
    .bind(&req.location)
    .bind(&req.job_type)
    .bind(&req.salary)
    .fetch_one(db)
    .await
    .context("insert job")?;
    Ok(job)
}

/// Partial update via COALESCE; absent fields keep their stored values.
/// Returns None for an unknown id.
pub async fn update(
    db: &PgPool,
    id: i32,
    req: &UpdateJobRequest,
) -> anyhow::Result<Option<Job>> {
    let job = sqlx::query_as::<_, Job>(&format!(
        r#"
        UPDATE jobs
        SET title = COALESCE($2, title),
            description = COALESCE($3, description),
            location = COALESCE($4, location),
            type = COALESCE($5, type),
            salary = COALESCE($6, salary)
        WHERE id = $1
        RETURNING {JOB_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&req.title)
    .bind(&req.description)
    .bind(&req.location)
    .bind(&req.job_type)
    .bind(&req.salary)
    .fetch_optional(db)
    .await
    .context("update job")?;
    Ok(job)
}

/// Delete a job; false when the id is unknown.
pub async fn delete(db: &PgPool, id: i32) -> anyhow::Result<bool> {
    let deleted = sqlx::query("DELETE FROM jobs WHERE id = $1")
        .bind(id)
        .execute(db)
        .await
        .context("delete job")?
        .rows_affected();
    Ok(deleted > 0)
}
