// tests/scrape_batch.rs
//
// Orchestrator contract: one result per input identifier, bounded in-flight
// fetches, no sibling cancellation, empty batch rejected.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use commentsense::config::ScrapeConfig;
use commentsense::scrape::{
    scrape_batch, Comment, CommentFetcher, PageFetch, INVALID_LINK_ERROR,
};

fn comment(text: &str, likes: u32) -> Comment {
    Comment {
        title: "My 60-second pasta recipe".into(),
        text: text.into(),
        likes,
    }
}

fn cfg(workers: usize) -> ScrapeConfig {
    ScrapeConfig {
        workers,
        page_size: 50,
        max_retries: 3,
        item_wall_clock: Duration::from_secs(30),
        ..ScrapeConfig::default()
    }
}

/// Counts simultaneous fetches; each call is one single-page success.
struct GaugedFetcher {
    inflight: AtomicUsize,
    max_seen: AtomicUsize,
}

impl GaugedFetcher {
    fn new() -> Self {
        Self {
            inflight: AtomicUsize::new(0),
            max_seen: AtomicUsize::new(0),
        }
    }
}

#[async_trait::async_trait]
impl CommentFetcher for GaugedFetcher {
    async fn fetch_page(&self, _item_id: &str, _count: u32, _cursor: u64) -> PageFetch {
        let now = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_seen.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(25)).await;
        self.inflight.fetch_sub(1, Ordering::SeqCst);
        PageFetch::page(vec![comment("ok", 1)], false)
    }
}

/// Replays pages in call order across all items.
struct ScriptedFetcher {
    pages: Mutex<Vec<PageFetch>>,
}

impl ScriptedFetcher {
    fn new(pages: Vec<PageFetch>) -> Self {
        Self {
            pages: Mutex::new(pages),
        }
    }
}

#[async_trait::async_trait]
impl CommentFetcher for ScriptedFetcher {
    async fn fetch_page(&self, _item_id: &str, _count: u32, _cursor: u64) -> PageFetch {
        let mut pages = self.pages.lock().unwrap();
        if pages.is_empty() {
            PageFetch::failure()
        } else {
            pages.remove(0)
        }
    }
}

#[tokio::test]
async fn empty_batch_is_a_caller_error() {
    let fetcher = Arc::new(GaugedFetcher::new());
    let result = scrape_batch(fetcher, &[], &cfg(2)).await;
    assert!(result.is_err());
}

#[tokio::test]
async fn every_input_identifier_gets_exactly_one_entry() {
    let links: Vec<String> = vec![
        "video/100".into(),
        "not-a-video-link".into(),
        "video/200".into(),
        "also bad".into(),
        "video/300".into(),
    ];
    let fetcher = Arc::new(GaugedFetcher::new());

    let results = scrape_batch(fetcher, &links, &cfg(2)).await.unwrap();

    assert_eq!(results.len(), links.len());
    for link in &links {
        assert!(results.contains_key(link), "missing entry for {link}");
    }
    assert_eq!(
        results["not-a-video-link"].error.as_deref(),
        Some(INVALID_LINK_ERROR)
    );
    assert!(results["video/200"].error.is_none());
}

#[tokio::test]
async fn in_flight_fetches_never_exceed_the_pool_size() {
    let links: Vec<String> = (0..8).map(|i| format!("video/{i}00")).collect();
    let fetcher = Arc::new(GaugedFetcher::new());

    let dyn_fetcher: Arc<dyn CommentFetcher> = fetcher.clone();
    let results = scrape_batch(dyn_fetcher, &links, &cfg(2))
        .await
        .unwrap();

    assert_eq!(results.len(), 8);
    let max = fetcher.max_seen.load(Ordering::SeqCst);
    assert!(max <= 2, "saw {max} simultaneous fetches with pool size 2");
    assert!(max >= 1);
}

#[tokio::test]
async fn one_bad_link_does_not_cancel_its_siblings() {
    let links: Vec<String> = vec!["bad-url".into(), "video/123456".into()];
    let fetcher = Arc::new(ScriptedFetcher::new(vec![
        PageFetch::page(
            (0..10).map(|i| comment(&format!("c{i}"), i * 3)).collect(),
            true,
        ),
        PageFetch::page(Vec::new(), false),
    ]));

    let results = scrape_batch(fetcher, &links, &cfg(2)).await.unwrap();

    let bad = &results["bad-url"];
    assert_eq!(bad.error.as_deref(), Some(INVALID_LINK_ERROR));
    assert_eq!(bad.comment_count, 0);
    assert!(bad.comments.is_empty());

    let good = &results["video/123456"];
    assert!(good.error.is_none());
    assert_eq!(good.comment_count, 10);
    assert!(
        good.comments.windows(2).all(|w| w[0].likes >= w[1].likes),
        "comments ranked by likes descending"
    );
}
