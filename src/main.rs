mod activity;
mod app;
mod applications;
mod auth;
mod bookmarks;
mod config;
mod crawler;
mod errors;
mod jobs;
mod pagination;
mod state;
mod storage;

use crate::crawler::{start_scheduler, CrawlGuard};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "jobboard=debug,axum=info,tower_http=info".to_string());
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

    let state = AppState::init().await?;

    if let Err(e) = sqlx::migrate!("./migrations").run(&state.db).await {
        tracing::warn!(error = %e, "migration failed; continuing");
    }

    let guard = CrawlGuard::default();

    // `jobboard crawl` runs a single crawl in the foreground and exits
    if std::env::args().nth(1).as_deref() == Some("crawl") {
        let summary = guard.run(&state.db, &state.config.crawler).await?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let _scheduler = start_scheduler(state.db.clone(), state.config.crawler.clone(), guard).await?;

    app::serve(app::build_app(state)).await
}
