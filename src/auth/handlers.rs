use axum::{
    extract::rejection::JsonRejection,
    extract::{FromRef, Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::dto::{
    ForgotPasswordRequest, LoginData, LoginRequest, PromoteRequest, ResetPasswordRequest,
    ResetTokenData, SignupRequest,
};
use crate::auth::jwt::{AuthUser, JwtKeys};
use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo;
use crate::auth::repo_types::{Role, User};
use crate::error::{ApiError, ApiResult};
use crate::response::ApiResponse;
use crate::sessions::CurrentSession;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/user/signup", post(signup))
        .route("/user/login", post(login))
        .route("/user/logout", get(logout))
        .route("/user/forgot-password", post(forgot_password))
        .route("/user/reset-password", post(reset_password))
        .route("/user/:uid", delete(delete_user))
        .route("/user/:uid/promote", post(promote_to_admin))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|_| ApiError::bad_request("invalid request body"))
}

/// Path params arrive brace-wrapped from some clients; tolerate `{uuid}`.
fn parse_uid(raw: &str) -> ApiResult<Uuid> {
    let trimmed = raw.trim_matches(|c| c == '{' || c == '}');
    Uuid::parse_str(trimmed).map_err(|_| ApiError::bad_request("invalid user id"))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let payload = parse_body(payload)?;

    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("username is required"))?;
    let password = payload
        .password
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("password is required"))?;
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
        .ok_or_else(|| ApiError::bad_request("email is required"))?;

    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(ApiError::bad_request("invalid email"));
    }
    if password.len() < 8 {
        warn!("password too short");
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }

    let hash = hash_password(password)?;
    let user = User::create(&state.db, username, &email, &hash)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict("username or email already taken".into()),
            other => other,
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(Json(ApiResponse::message("User created successfully")))
}

#[instrument(skip(state, payload, session))]
pub async fn login(
    State(state): State<AppState>,
    session: Option<Extension<CurrentSession>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<LoginData>>> {
    let payload = parse_body(payload)?;

    let username = payload
        .username
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("username is required"))?;
    let password = payload
        .password
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("password is required"))?;

    // Unknown usernames and wrong passwords get the same answer so the
    // endpoint cannot be used to enumerate accounts.
    let user = match User::find_by_username(&state.db, username).await? {
        Some(u) => u,
        None => {
            warn!(%username, "login with unknown username");
            return Err(ApiError::unauthorized("invalid credentials"));
        }
    };
    if !verify_password(password, &user.password_hash)? {
        warn!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::unauthorized("invalid credentials"));
    }

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&user)?;

    // Tie any anonymous session carried by this request to the account.
    if let Some(Extension(CurrentSession(session_id))) = session {
        if let Err(e) = crate::sessions::repo::link_to_user(&state.db, &session_id, user.id).await {
            warn!(error = %e, user_id = %user.id, "failed to link session to user");
        }
    }

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok(Json(ApiResponse::ok(
        "Login successful",
        LoginData {
            token,
            user_id: user.id,
            username: user.username,
            role: user.role,
        },
    )))
}

/// Tokens are stateless, so logout has no server-side effect; the client
/// discards its token.
#[instrument(skip(auth))]
pub async fn logout(auth: AuthUser) -> Json<ApiResponse<()>> {
    info!(user_id = %auth.user_id, "user logged out");
    Json(ApiResponse::message("Logged out successfully"))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<ResetTokenData>>> {
    let payload = parse_body(payload)?;
    let email = payload
        .email
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
        .ok_or_else(|| ApiError::bad_request("email is required"))?;

    let token = repo::create_password_reset(&state.db, &email)
        .await?
        .ok_or_else(|| ApiError::not_found("user not found"))?;

    // Returned in the body for now; a production deployment would email the
    // reset link instead.
    Ok(Json(ApiResponse::ok(
        "Reset token generated",
        ResetTokenData { reset_token: token },
    )))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let payload = parse_body(payload)?;
    let token = payload
        .reset_token
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("reset_token is required"))?;
    let new_password = payload
        .new_password
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request("new_password is required"))?;
    if new_password.len() < 8 {
        return Err(ApiError::bad_request("password must be at least 8 characters"));
    }

    let hash = hash_password(new_password)?;
    if !repo::consume_password_reset(&state.db, token, &hash).await? {
        return Err(ApiError::bad_request("invalid or expired reset token"));
    }

    info!("password reset completed");
    Ok(Json(ApiResponse::message("Password reset successfully")))
}

#[instrument(skip(state, auth))]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(uid): Path<String>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let uid = parse_uid(&uid)?;

    // Self-service or admin only.
    if auth.user_id != uid && auth.role != Role::Admin {
        warn!(caller = %auth.user_id, target = %uid, "unauthorized delete attempt");
        return Err(ApiError::forbidden("not allowed to delete this user"));
    }

    if !User::delete_cascade(&state.db, uid).await? {
        return Err(ApiError::not_found("user not found"));
    }

    info!(caller = %auth.user_id, target = %uid, "user deleted");
    Ok(Json(ApiResponse::message("User deleted successfully")))
}

/// Promotion needs the admin role plus a second factor: the server-side
/// promotion key. With no key configured the endpoint always refuses.
#[instrument(skip(state, auth, payload))]
pub async fn promote_to_admin(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(uid): Path<String>,
    payload: Result<Json<PromoteRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<()>>> {
    let uid = parse_uid(&uid)?;

    if auth.role != Role::Admin {
        warn!(caller = %auth.user_id, "non-admin promotion attempt");
        return Err(ApiError::forbidden("only administrators can promote users"));
    }

    let payload = parse_body(payload)?;
    let key_matches = match (&state.config.admin_promotion_key, &payload.secret_key) {
        (Some(expected), Some(given)) => expected == given,
        _ => false,
    };
    if !key_matches {
        warn!(caller = %auth.user_id, target = %uid, "promotion key rejected");
        return Err(ApiError::unauthorized("invalid promotion key"));
    }

    if !User::promote_to_admin(&state.db, uid).await? {
        return Err(ApiError::not_found("user not found"));
    }

    info!(caller = %auth.user_id, target = %uid, "user promoted to admin");
    Ok(Json(ApiResponse::message("User promoted to admin successfully")))
}
