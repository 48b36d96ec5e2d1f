use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument};

use crate::auth::jwt::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::pagination::{self, Page};
use crate::resources::dto::ResourceQuery;
use crate::resources::repo;
use crate::resources::repo_types::Resource;
use crate::resources::services::{self, NewResourceUpload};
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/resources", get(list_resources))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/resources", post(create_resource))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
}

/// GET /resources — public paginated listing.
#[instrument(skip(state))]
pub async fn list_resources(
    State(state): State<AppState>,
    Query(query): Query<ResourceQuery>,
) -> ApiResult<Json<ApiResponse<Page<Resource>>>> {
    let page = pagination::coerce_page(query.page.as_deref());
    let name = query.name.as_deref().filter(|v| !v.is_empty());
    let category = query.categories.as_deref().filter(|v| !v.is_empty());

    let result = repo::search(&state.db, name, category, page).await?;
    Ok(Json(ApiResponse::data(result)))
}

/// POST /resources — multipart upload, token required. Validation runs in
/// order: name, file presence, extension, size; nothing touches storage
/// until all of it passes.
#[instrument(skip(state, auth, multipart))]
pub async fn create_resource(
    State(state): State<AppState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<ApiResponse<Resource>>> {
    let mut name: Option<String> = None;
    let mut parent_directory: Option<String> = None;
    let mut categories: Vec<String> = Vec::new();
    let mut file: Option<(String, Option<String>, bytes::Bytes)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::bad_request("malformed multipart body"))?
    {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => {
                name = Some(
                    field
                        .text()
                        .await
                        .map_err(|_| ApiError::bad_request("invalid name field"))?,
                );
            }
            Some("parent_directory") => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("invalid parent_directory field"))?;
                parent_directory = (!value.trim().is_empty()).then_some(value);
            }
            Some("categories") => {
                let raw = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("invalid categories field"))?;
                categories = services::parse_categories(&raw);
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::bad_request("file is required"))?;
                let content_type = field.content_type().map(str::to_string);
                let body = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::bad_request("failed to read file"))?;
                file = Some((file_name, content_type, body));
            }
            _ => {}
        }
    }

    let name = name
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("name is required"))?;
    let (file_name, content_type, body) =
        file.ok_or_else(|| ApiError::bad_request("file is required"))?;
    services::validate_extension(&file_name)?;
    if body.len() > state.config.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "file exceeds the {} byte limit",
            state.config.max_upload_bytes
        )));
    }

    let resource = services::store_resource(
        &state,
        auth.user_id,
        NewResourceUpload {
            name,
            parent_directory,
            categories,
            file_name,
            content_type,
            body,
        },
    )
    .await?;

    info!(resource_id = %resource.id, user_id = %auth.user_id, "resource uploaded");
    Ok(Json(ApiResponse::ok("Resource uploaded successfully", resource)))
}
