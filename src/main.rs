//! CommentSense backend — binary entrypoint.
//! Boots the Axum HTTP server, wiring routes, shared state, and middleware.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commentsense::agent::{FeedbackAgent, InMemorySessionStore, DEFAULT_MAX_TURNS};
use commentsense::api::{self, AppState};
use commentsense::config::AppConfig;
use commentsense::llm::{build_chat_client, AiConfig};
use commentsense::metrics::Metrics;
use commentsense::prompts::PromptConfig;
use commentsense::scrape::fetcher::HttpCommentFetcher;
use commentsense::store::MIGRATOR;
use commentsense::summarize::CommentSummarizer;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("commentsense=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = AppConfig::from_env()?;

    let db_opts = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database url {}", cfg.database_url))?
        .create_if_missing(true);
    let db = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(db_opts)
        .await
        .context("opening database")?;
    MIGRATOR.run(&db).await.context("running migrations")?;

    let ai_cfg = AiConfig::load_from_file(&cfg.ai_config_path)?;
    let chat_client = build_chat_client(&ai_cfg)?;
    let prompt_cfg = PromptConfig::load(&cfg.prompts_path)?;

    let fetcher = Arc::new(HttpCommentFetcher::new(&cfg.scrape)?);
    let summarizer = Arc::new(CommentSummarizer::new(
        Arc::clone(&chat_client),
        prompt_cfg.summarizer.system.clone(),
    ));
    let sessions = Arc::new(InMemorySessionStore::new(DEFAULT_MAX_TURNS));
    let agent = Arc::new(FeedbackAgent::new(
        chat_client,
        prompt_cfg.feedback.system.clone(),
        sessions,
    ));

    let metrics = Metrics::init(cfg.scrape.workers);

    let state = AppState {
        db,
        fetcher,
        summarizer,
        agent,
        scrape: cfg.scrape.clone(),
    };
    let app = api::create_router(state, &cfg.cors_origin).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr)
        .await
        .with_context(|| format!("binding {}", cfg.bind_addr))?;
    info!(addr = %cfg.bind_addr, "commentsense listening");
    axum::serve(listener, app).await.context("serving")?;

    Ok(())
}
