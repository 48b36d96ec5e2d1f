use std::net::SocketAddr;
use std::time::Duration;

use axum::{middleware, routing::get, Router};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::error::ApiError;
use crate::state::AppState;
use crate::{auth, jobs, resources, sessions};

async fn health() -> &'static str {
    "ok"
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}

pub fn build_app(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth::router())
        .merge(resources::router())
        .merge(jobs::router())
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            sessions::handle_session,
        ));

    Router::new()
        .nest("/v1", api)
        .fallback(not_found)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     _latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, "response");
                        } else {
                            tracing::info!(%status, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8081".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::extract::FromRef;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use time::OffsetDateTime;
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::auth::jwt::JwtKeys;
    use crate::auth::repo_types::{Role, User};

    async fn body_json(res: axum::http::Response<Body>) -> serde_json::Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn bearer_for(state: &AppState, role: Role) -> String {
        let keys = JwtKeys::from_ref(state);
        let user = User {
            id: Uuid::new_v4(),
            username: "amina".into(),
            email: "amina@example.com".into(),
            password_hash: "x".into(),
            role,
            created_at: OffsetDateTime::now_utc(),
        };
        format!("Bearer {}", keys.sign(&user).unwrap())
    }

    #[tokio::test]
    async fn unknown_route_returns_404_envelope() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/v1/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let json = body_json(res).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Route not found");
    }

    #[tokio::test]
    async fn protected_route_without_token_returns_401_envelope() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/v1/jobs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(res).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "authorization header is required");
    }

    #[tokio::test]
    async fn garbage_token_returns_401() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::get("/v1/jobs")
                    .header(header::AUTHORIZATION, "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(res).await;
        assert_eq!(json["error"], "invalid or expired token");
    }

    #[tokio::test]
    async fn non_bearer_scheme_returns_401() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::get("/v1/user/logout")
                    .header(header::AUTHORIZATION, "Basic dXNlcjpwdw==")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn job_create_without_title_is_rejected_before_any_db_call() {
        let state = AppState::fake();
        let token = bearer_for(&state, Role::User);
        let app = build_app(state);
        let res = app
            .oneshot(
                Request::post("/v1/jobs")
                    .header(header::AUTHORIZATION, token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"], "title is required");
    }

    #[tokio::test]
    async fn logout_with_valid_token_succeeds() {
        let state = AppState::fake();
        let token = bearer_for(&state, Role::User);
        let app = build_app(state);
        let res = app
            .oneshot(
                Request::get("/v1/user/logout")
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Logged out successfully");
    }

    #[tokio::test]
    async fn malformed_json_body_returns_400_envelope() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::post("/v1/user/signup")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"], "invalid request body");
    }

    #[tokio::test]
    async fn non_admin_cannot_delete_someone_else() {
        let state = AppState::fake();
        let token = bearer_for(&state, Role::User);
        let app = build_app(state);
        let target = Uuid::new_v4();
        let res = app
            .oneshot(
                Request::delete(format!("/v1/user/{target}"))
                    .header(header::AUTHORIZATION, token)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let json = body_json(res).await;
        assert_eq!(json["error"], "not allowed to delete this user");
    }

    #[tokio::test]
    async fn promote_requires_admin_role() {
        let state = AppState::fake();
        let token = bearer_for(&state, Role::Teacher);
        let app = build_app(state);
        let target = Uuid::new_v4();
        let res = app
            .oneshot(
                Request::post(format!("/v1/user/{target}/promote"))
                    .header(header::AUTHORIZATION, token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"secret_key": "test-promotion-key"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn promote_with_wrong_key_is_unauthorized() {
        let state = AppState::fake();
        let token = bearer_for(&state, Role::Admin);
        let app = build_app(state);
        let target = Uuid::new_v4();
        let res = app
            .oneshot(
                Request::post(format!("/v1/user/{target}/promote"))
                    .header(header::AUTHORIZATION, token)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"secret_key": "wrong"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let json = body_json(res).await;
        assert_eq!(json["error"], "invalid promotion key");
    }

    #[tokio::test]
    async fn resource_upload_requires_token() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(
                Request::post("/v1/resources")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    fn multipart_body(boundary: &str, name: Option<&str>, file: Option<(&str, &str)>) -> String {
        let mut body = String::new();
        if let Some(name) = name {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"name\"\r\n\r\n{name}\r\n"
            ));
        }
        if let Some((file_name, bytes)) = file {
            body.push_str(&format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n{bytes}\r\n"
            ));
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        body
    }

    #[tokio::test]
    async fn upload_with_disallowed_extension_is_rejected() {
        let state = AppState::fake();
        let token = bearer_for(&state, Role::User);
        let app = build_app(state);
        let boundary = "XBOUNDARY";
        let body = multipart_body(boundary, Some("Holiday photo"), Some(("photo.jpg", "jpegdata")));
        let res = app
            .oneshot(
                Request::post("/v1/resources")
                    .header(header::AUTHORIZATION, token)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"], "invalid file type: .jpg");
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let state = AppState::fake();
        let token = bearer_for(&state, Role::User);
        let app = build_app(state);
        let boundary = "XBOUNDARY";
        let body = multipart_body(boundary, Some("Lecture notes"), None);
        let res = app
            .oneshot(
                Request::post("/v1/resources")
                    .header(header::AUTHORIZATION, token)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"], "file is required");
    }

    #[tokio::test]
    async fn upload_without_name_is_rejected() {
        let state = AppState::fake();
        let token = bearer_for(&state, Role::User);
        let app = build_app(state);
        let boundary = "XBOUNDARY";
        let body = multipart_body(boundary, None, Some(("resume.pdf", "pdfdata")));
        let res = app
            .oneshot(
                Request::post("/v1/resources")
                    .header(header::AUTHORIZATION, token)
                    .header(
                        header::CONTENT_TYPE,
                        format!("multipart/form-data; boundary={boundary}"),
                    )
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let json = body_json(res).await;
        assert_eq!(json["error"], "name is required");
    }

    #[tokio::test]
    async fn health_is_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }
}
