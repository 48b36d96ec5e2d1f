use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use crate::auth::jwt::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::jobs::dto::{CreateJobRequest, JobQuery, UpdateJobRequest};
use crate::jobs::repo;
use crate::jobs::repo_types::Job;
use crate::pagination::{self, Page};
use crate::response::ApiResponse;
use crate::state::AppState;

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs).post(create_job))
        .route("/jobs/:id", get(get_job).put(update_job).delete(delete_job))
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|_| ApiError::bad_request("invalid request body"))
}

#[instrument(skip(state, auth))]
pub async fn list_jobs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<ApiResponse<Page<Job>>>> {
    let page = pagination::coerce_page(query.page.as_deref());
    let title = query.title.as_deref().filter(|v| !v.is_empty());
    let job_type = query.job_type.as_deref().filter(|v| !v.is_empty());
    let location = query.location.as_deref().filter(|v| !v.is_empty());

    let result = repo::search(&state.db, title, job_type, location, page).await?;
    Ok(Json(ApiResponse::ok("Jobs retrieved successfully", result)))
}

#[instrument(skip(state, auth))]
pub async fn get_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Job>>> {
    let job = repo::get(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;
    Ok(Json(ApiResponse::data(job)))
}

#[instrument(skip(state, auth, payload))]
pub async fn create_job(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Job>>> {
    let payload = parse_body(payload)?;
    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("title is required"))?
        .to_string();

    let job = repo::create(&state.db, &payload, &title).await?;
    info!(job_id = job.id, user_id = %auth.user_id, "job created");
    Ok(Json(ApiResponse::ok("Job created successfully", job)))
}

#[instrument(skip(state, auth, payload))]
pub async fn update_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
    payload: Result<Json<UpdateJobRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<Job>>> {
    let payload = parse_body(payload)?;

    let job = repo::update(&state.db, id, &payload)
        .await?
        .ok_or_else(|| ApiError::not_found("job not found"))?;
    info!(job_id = job.id, user_id = %auth.user_id, "job updated");
    Ok(Json(ApiResponse::ok("Job updated successfully", job)))
}

#[instrument(skip(state, auth))]
pub async fn delete_job(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<Json<ApiResponse<()>>> {
    if !repo::delete(&state.db, id).await? {
        return Err(ApiError::not_found("job not found"));
    }
    info!(job_id = id, user_id = %auth.user_id, "job deleted");
    Ok(Json(ApiResponse::message("Job deleted successfully")))
}
