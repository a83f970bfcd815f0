// src/scrape/manager.rs
//! Per-item scrape loop: paginate the comment feed for one video until the
//! feed is exhausted, the consecutive-failure budget runs out, or the
//! wall-clock cap expires. Pagination is strictly sequential; each page
//! depends on the previous cursor.

use metrics::counter;
use once_cell::sync::OnceCell;
use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ScrapeConfig;
use crate::scrape::types::{Comment, CommentFetcher, ScrapeOutcome};

pub const INVALID_LINK_ERROR: &str = "Invalid video link";

/// Extract the numeric item id from a video link. Requires at least one
/// digit; a bare `video/` never yields an empty id.
pub fn extract_item_id(link: &str) -> Option<&str> {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"video/([0-9]+)").expect("item id regex"));
    re.captures(link).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Scrape as complete a comment set as practical for one video link, then
/// rank by likes and truncate. Never raises; degraded and empty results are
/// ordinary outcomes.
pub async fn scrape_item(
    fetcher: &dyn CommentFetcher,
    link: &str,
    cfg: &ScrapeConfig,
) -> ScrapeOutcome {
    let Some(item_id) = extract_item_id(link) else {
        warn!(target: "scrape", link, "invalid video link");
        counter!("scrape_invalid_links_total").increment(1);
        return ScrapeOutcome::error(INVALID_LINK_ERROR);
    };

    let started = Instant::now();
    let deadline = started + cfg.item_wall_clock;
    let mut comments: Vec<Comment> = Vec::new();
    let mut cursor: u64 = 0;
    let mut consecutive_failures: u32 = 0;
    let mut has_more = true;

    while has_more && consecutive_failures < cfg.max_retries {
        if Instant::now() >= deadline {
            warn!(
                target: "scrape",
                link,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "item wall-clock cap reached, keeping partial result"
            );
            counter!("scrape_deadline_exceeded_total").increment(1);
            break;
        }

        let page = fetcher.fetch_page(item_id, cfg.page_size, cursor).await;
        if page.failed {
            consecutive_failures += 1;
            debug!(
                target: "scrape",
                link,
                cursor,
                attempt = consecutive_failures,
                max = cfg.max_retries,
                "page fetch failed, retrying at same cursor"
            );
            counter!("scrape_page_failures_total").increment(1);
            continue;
        }

        counter!("scrape_pages_total").increment(1);
        comments.extend(page.comments);
        cursor += u64::from(cfg.page_size);
        consecutive_failures = 0;
        has_more = page.has_more;
    }

    if has_more {
        // Budget or deadline stopped us before the feed was exhausted.
        counter!("scrape_degraded_items_total").increment(1);
    }

    let kept = ScrapeOutcome::collected(comments, has_more, cfg.max_comments);
    debug!(
        target: "scrape",
        link,
        comments = kept.comment_count,
        degraded = kept.degraded,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "item scrape finished"
    );
    kept
}
