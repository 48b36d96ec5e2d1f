use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use tracing::warn;

use crate::state::AppState;

pub mod repo;

pub const SESSION_COOKIE: &str = "session_id";
pub static SESSION_HEADER: HeaderName = HeaderName::from_static("x-session-id");

/// Session id attached to the request for downstream handlers.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub String);

async fn resolve_session(
    db: &sqlx::PgPool,
    incoming: Option<String>,
) -> anyhow::Result<(String, bool)> {
    if let Some(id) = incoming {
        if repo::validate_and_refresh(db, &id).await? {
            return Ok((id, false));
        }
    }
    let id = repo::create(db).await?;
    Ok((id, true))
}

/// Anonymous-session bookkeeping for the whole /v1 tree. This is not an
/// authorization gate: identity comes from the bearer token, the session
/// only ties anonymous activity to a later login. A database hiccup here
/// logs a warning and lets the request through without a session.
pub async fn handle_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Response {
    let incoming = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .or_else(|| {
            req.headers()
                .get(&SESSION_HEADER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });

    let (session_id, is_new) = match resolve_session(&state.db, incoming).await {
        Ok(resolved) => resolved,
        Err(e) => {
            warn!(error = %e, "session bookkeeping failed");
            return next.run(req).await;
        }
    };

    req.extensions_mut()
        .insert(CurrentSession(session_id.clone()));
    let mut res = next.run(req).await;

    if let Ok(value) = HeaderValue::from_str(&session_id) {
        res.headers_mut().insert(&SESSION_HEADER, value);
    }
    if is_new {
        let cookie = format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, session_id);
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            res.headers_mut()
                .append(axum::http::header::SET_COOKIE, value);
        }
    }
    res
}
