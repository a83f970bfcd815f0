// src/scrape/fetcher.rs
//! HTTP Comment Fetcher: one paginated call against the external
//! comment-listing endpoint, parsed into a typed page. Every failure mode —
//! transport, non-2xx, bad JSON, missing fields — collapses into a failed
//! `PageFetch`; nothing propagates past this boundary.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use metrics::counter;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ScrapeConfig;
use crate::scrape::types::{Comment, CommentFetcher, PageFetch};

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// How much of a malformed payload gets logged for diagnosis.
const RAW_LOG_LIMIT: usize = 600;

pub struct HttpCommentFetcher {
    http: reqwest::Client,
    endpoint: String,
    target_language: String,
}

impl HttpCommentFetcher {
    pub fn new(cfg: &ScrapeConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(cfg.connect_timeout)
            .timeout(cfg.request_timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            target_language: cfg.target_language.clone(),
        })
    }
}

#[async_trait]
impl CommentFetcher for HttpCommentFetcher {
    async fn fetch_page(&self, item_id: &str, count: u32, cursor: u64) -> PageFetch {
        let count_param = count.to_string();
        let cursor_param = cursor.to_string();
        let resp = match self
            .http
            .get(&self.endpoint)
            .query(&[
                ("aweme_id", item_id),
                ("count", count_param.as_str()),
                ("cursor", cursor_param.as_str()),
            ])
            .header("accept", "*/*")
            .header("accept-language", "en-US,en;q=0.9")
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!(target: "scrape", item_id, cursor, error = %e, "comment page request failed");
                counter!("scrape_transport_errors_total").increment(1);
                return PageFetch::failure();
            }
        };

        let status = resp.status();
        let body = match resp.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(target: "scrape", item_id, cursor, error = %e, "comment page body unreadable");
                counter!("scrape_transport_errors_total").increment(1);
                return PageFetch::failure();
            }
        };

        if !status.is_success() {
            warn!(target: "scrape", item_id, cursor, status = %status, "comment page returned non-2xx");
            counter!("scrape_http_errors_total").increment(1);
            return PageFetch::failure();
        }

        match parse_comment_page(&body, &self.target_language) {
            Ok((comments, has_more)) => PageFetch::page(comments, has_more),
            Err(e) => {
                // Best-effort raw dump for diagnosis; never blocks the caller.
                warn!(target: "scrape", item_id, cursor, error = %e, "unexpected comment payload");
                debug!(target: "scrape", body = %truncate(&body, RAW_LOG_LIMIT), "raw comment payload");
                counter!("scrape_parse_errors_total").increment(1);
                PageFetch::failure()
            }
        }
    }
}

// The source API is loose about types: `has_more` arrives as a bool or a
// 0/1 number depending on the endpoint revision.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Num(i64),
}

impl Flag {
    fn is_set(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Num(n) => *n != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPage {
    comments: Option<Vec<RawComment>>,
    has_more: Option<Flag>,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    share_info: Option<RawShareInfo>,
    text: Option<String>,
    digg_count: Option<i64>,
    comment_language: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawShareInfo {
    title: Option<String>,
}

/// Parse one page body. Success requires both `comments` and `has_more` to be
/// present; retained comments (matching the target language) must carry all
/// projected fields. A malformed entry that the language filter discards does
/// not fail the page.
pub fn parse_comment_page(body: &str, target_language: &str) -> Result<(Vec<Comment>, bool)> {
    let raw: RawPage = serde_json::from_str(body)?;
    let entries = raw.comments.ok_or_else(|| anyhow!("missing `comments`"))?;
    let has_more = raw
        .has_more
        .ok_or_else(|| anyhow!("missing `has_more`"))?
        .is_set();

    let mut comments = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.comment_language.as_deref() != Some(target_language) {
            continue;
        }
        let title = entry
            .share_info
            .and_then(|s| s.title)
            .ok_or_else(|| anyhow!("comment missing `share_info.title`"))?;
        let text = entry.text.ok_or_else(|| anyhow!("comment missing `text`"))?;
        let likes = entry
            .digg_count
            .ok_or_else(|| anyhow!("comment missing `digg_count`"))?
            .max(0) as u32;
        comments.push(Comment {
            title: clean_text(&title),
            text: clean_text(&text),
            likes,
        });
    }
    Ok((comments, has_more))
}

/// Decode HTML entities and collapse whitespace in scraped text.
fn clean_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let mut out = String::with_capacity(decoded.len());
    let mut prev_space = false;
    for ch in decoded.chars() {
        let c = if ch.is_whitespace() { ' ' } else { ch };
        if c == ' ' {
            if !prev_space && !out.is_empty() {
                out.push(' ');
            }
            prev_space = true;
        } else {
            out.push(c);
            prev_space = false;
        }
    }
    out.trim_end().to_string()
}

fn truncate(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
