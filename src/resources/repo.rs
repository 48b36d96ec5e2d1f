use anyhow::Context;
use sqlx::{PgPool, Postgres, Transaction};

use crate::pagination::{self, Page, PAGE_SIZE};
use crate::resources::repo_types::{Resource, Upload};

/// Paginated search, newest first. `name` is a case-insensitive substring
/// match, `category` an exact match against one tag of the array. Ordering
/// within equal timestamps is implementation-defined.
pub async fn search(
    db: &PgPool,
    name: Option<&str>,
    category: Option<&str>,
    page: i64,
) -> anyhow::Result<Page<Resource>> {
    let total_items: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM resources
        WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR $2 = ANY(categories))
        "#,
    )
    .bind(name)
    .bind(category)
    .fetch_one(db)
    .await
    .context("count resources")?;

    let total_pages = pagination::total_pages(total_items);
    let page = pagination::clamp_page(page, total_pages);

    let items = sqlx::query_as::<_, Resource>(
        r#"
        SELECT id, name, parent_url, parent_directory, relative_path,
               download_link, categories, user_id, created_at
        FROM resources
        WHERE ($1::text IS NULL OR name ILIKE '%' || $1 || '%')
          AND ($2::text IS NULL OR $2 = ANY(categories))
        ORDER BY created_at DESC
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(name)
    .bind(category)
    .bind(PAGE_SIZE)
    .bind(pagination::offset(page))
    .fetch_all(db)
    .await
    .context("fetch resources")?;

    Ok(Page {
        current_page: page,
        total_pages,
        total_items,
        page_size: PAGE_SIZE,
        items,
    })
}

/// Insert a resource row within the upload transaction.
pub async fn insert_resource_tx(
    tx: &mut Transaction<'_, Postgres>,
    resource: &Resource,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO resources (id, name, parent_url, parent_directory,
                               relative_path, download_link, categories, user_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(resource.id)
    .bind(&resource.name)
    .bind(&resource.parent_url)
    .bind(&resource.parent_directory)
    .bind(&resource.relative_path)
    .bind(&resource.download_link)
    .bind(&resource.categories)
    .bind(resource.user_id)
    .bind(resource.created_at)
    .execute(&mut **tx)
    .await
    .context("insert resource")?;
    Ok(())
}

/// Insert the upload bookkeeping row within the same transaction.
pub async fn insert_upload_tx(
    tx: &mut Transaction<'_, Postgres>,
    upload: &Upload,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO uploads (id, file_name, file_path, file_size, content_type, user_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(upload.id)
    .bind(&upload.file_name)
    .bind(&upload.file_path)
    .bind(upload.file_size)
    .bind(&upload.content_type)
    .bind(upload.user_id)
    .bind(upload.created_at)
    .execute(&mut **tx)
    .await
    .context("insert upload")?;
    Ok(())
}
