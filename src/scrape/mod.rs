// src/scrape/mod.rs
pub mod fetcher;
pub mod manager;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use metrics::{describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::config::ScrapeConfig;
pub use crate::scrape::manager::{extract_item_id, scrape_item, INVALID_LINK_ERROR};
pub use crate::scrape::types::{Comment, CommentFetcher, PageFetch, ScrapeOutcome};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scrape_pages_total", "Comment pages fetched successfully.");
        describe_counter!(
            "scrape_page_failures_total",
            "Failed page fetches (transport/parse/format), retried at the same cursor."
        );
        describe_counter!(
            "scrape_transport_errors_total",
            "Comment endpoint transport errors."
        );
        describe_counter!("scrape_http_errors_total", "Non-2xx comment endpoint responses.");
        describe_counter!("scrape_parse_errors_total", "Malformed comment payloads.");
        describe_counter!(
            "scrape_invalid_links_total",
            "Batch entries with no extractable item id."
        );
        describe_counter!(
            "scrape_degraded_items_total",
            "Items whose pagination stopped before exhaustion."
        );
        describe_counter!(
            "scrape_deadline_exceeded_total",
            "Items stopped by the per-item wall-clock cap."
        );
        describe_gauge!("scrape_batch_size", "Identifiers in the most recent batch.");
    });
}

/// Scrape a batch of video links concurrently, bounded by the worker pool.
/// Returns exactly one outcome per input link; per-item failures never cancel
/// sibling work. An empty batch is a caller error.
pub async fn scrape_batch(
    fetcher: Arc<dyn CommentFetcher>,
    links: &[String],
    cfg: &ScrapeConfig,
) -> Result<HashMap<String, ScrapeOutcome>> {
    ensure_metrics_described();

    if links.is_empty() {
        bail!("URLS cannot be empty");
    }
    gauge!("scrape_batch_size").set(links.len() as f64);

    let semaphore = Arc::new(Semaphore::new(cfg.workers));
    let mut set = JoinSet::new();
    for link in links {
        let fetcher = Arc::clone(&fetcher);
        let semaphore = Arc::clone(&semaphore);
        let link = link.clone();
        let cfg = cfg.clone();
        set.spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(p) => p,
                Err(_) => return (link, ScrapeOutcome::error("scrape pool closed")),
            };
            let outcome = scrape_item(fetcher.as_ref(), &link, &cfg).await;
            (link, outcome)
        });
    }

    let mut results: HashMap<String, ScrapeOutcome> = HashMap::with_capacity(links.len());
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((link, outcome)) => {
                results.insert(link, outcome);
            }
            Err(e) => {
                warn!(target: "scrape", error = %e, "scrape worker task failed");
            }
        }
    }

    // A panicked worker must still leave its key in the map.
    for link in links {
        results
            .entry(link.clone())
            .or_insert_with(|| ScrapeOutcome::error("scrape worker failed"));
    }

    Ok(results)
}
