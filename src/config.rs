// src/config.rs
//! Application configuration. The environment is read once here at boot and
//! turned into explicit config objects handed to component constructors;
//! components themselves never touch env vars.

use anyhow::{Context, Result};
use std::time::Duration;

// --- env names & defaults ---
pub const ENV_BIND_ADDR: &str = "COMMENTSENSE_BIND_ADDR";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_CORS_ORIGIN: &str = "COMMENTSENSE_CORS_ORIGIN";
pub const ENV_AI_CONFIG_PATH: &str = "COMMENTSENSE_AI_CONFIG_PATH";
pub const ENV_PROMPTS_PATH: &str = "COMMENTSENSE_PROMPTS_PATH";

pub const ENV_COMMENT_ENDPOINT: &str = "SCRAPE_COMMENT_ENDPOINT";
pub const ENV_SCRAPE_PAGE_SIZE: &str = "SCRAPE_PAGE_SIZE";
pub const ENV_SCRAPE_MAX_RETRIES: &str = "SCRAPE_MAX_RETRIES";
pub const ENV_SCRAPE_WORKERS: &str = "SCRAPE_WORKERS";
pub const ENV_SCRAPE_ITEM_WALL_CLOCK_SECS: &str = "SCRAPE_ITEM_WALL_CLOCK_SECS";

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:commentsense.db";
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:3000";
pub const DEFAULT_AI_CONFIG_PATH: &str = "config/ai.json";
pub const DEFAULT_PROMPTS_PATH: &str = "config/prompts.toml";
pub const DEFAULT_COMMENT_ENDPOINT: &str = "https://www.tiktok.com/api/comment/list/";

/// Knobs for the comment-scraping pipeline.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    /// Base URL of the comment-listing endpoint.
    pub endpoint: String,
    /// Comments requested per page.
    pub page_size: u32,
    /// Consecutive failed fetches tolerated per item before giving up.
    pub max_retries: u32,
    /// Upper bound on simultaneously scraped items (= in-flight HTTP calls).
    pub workers: usize,
    /// Ranked comments kept per item.
    pub max_comments: usize,
    /// Source language tag a comment must carry to be retained.
    pub target_language: String,
    pub connect_timeout: Duration,
    /// Per-call timeout; without it the retry budget would not bound time.
    pub request_timeout: Duration,
    /// Hard cap on one item's total pagination time.
    pub item_wall_clock: Duration,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_COMMENT_ENDPOINT.to_string(),
            page_size: 50,
            max_retries: 3,
            workers: 100,
            max_comments: 250,
            target_language: "en".to_string(),
            connect_timeout: Duration::from_secs(4),
            request_timeout: Duration::from_secs(10),
            item_wall_clock: Duration::from_secs(45),
        }
    }
}

impl ScrapeConfig {
    /// Clamp nonsensical values instead of failing the boot.
    fn sanitized(mut self) -> Self {
        self.page_size = self.page_size.max(1);
        self.max_retries = self.max_retries.max(1);
        self.workers = self.workers.clamp(1, 1024);
        self.max_comments = self.max_comments.max(1);
        self
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub database_url: String,
    pub cors_origin: String,
    pub ai_config_path: String,
    pub prompts_path: String,
    pub scrape: ScrapeConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let scrape = ScrapeConfig {
            endpoint: env_or(ENV_COMMENT_ENDPOINT, DEFAULT_COMMENT_ENDPOINT),
            page_size: env_parsed(ENV_SCRAPE_PAGE_SIZE, 50)?,
            max_retries: env_parsed(ENV_SCRAPE_MAX_RETRIES, 3)?,
            workers: env_parsed(ENV_SCRAPE_WORKERS, 100)?,
            item_wall_clock: Duration::from_secs(env_parsed(
                ENV_SCRAPE_ITEM_WALL_CLOCK_SECS,
                45u64,
            )?),
            ..ScrapeConfig::default()
        }
        .sanitized();

        Ok(Self {
            bind_addr: env_or(ENV_BIND_ADDR, DEFAULT_BIND_ADDR),
            database_url: env_or(ENV_DATABASE_URL, DEFAULT_DATABASE_URL),
            cors_origin: env_or(ENV_CORS_ORIGIN, DEFAULT_CORS_ORIGIN),
            ai_config_path: env_or(ENV_AI_CONFIG_PATH, DEFAULT_AI_CONFIG_PATH),
            prompts_path: env_or(ENV_PROMPTS_PATH, DEFAULT_PROMPTS_PATH),
            scrape,
        })
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {name}={raw:?}")),
        Err(_) => Ok(default),
    }
}
