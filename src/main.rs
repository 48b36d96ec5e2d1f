use anyhow::Context;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod jobs;
mod pagination;
mod resources;
mod response;
mod sessions;
mod state;
mod storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "classboard=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = state::AppState::init().await?;

    sqlx::migrate!("./migrations")
        .run(&app_state.db)
        .await
        .context("run migrations")?;

    // Reclaims staged upload files orphaned by crashes, at startup and hourly.
    storage::spawn_staging_sweep(app_state.files.clone());

    let app = app::build_app(app_state);
    app::serve(app).await
}
