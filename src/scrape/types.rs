// src/scrape/types.rs

/// One retained comment, projected from the source payload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub title: String, // video title carried on each comment by the source API
    pub text: String,
    pub likes: u32,
}

/// Result of one paginated fetch. `failed` and `has_more` are distinct:
/// a failed call never reads as "no more pages".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFetch {
    pub comments: Vec<Comment>,
    pub has_more: bool,
    pub failed: bool,
}

impl PageFetch {
    pub fn page(comments: Vec<Comment>, has_more: bool) -> Self {
        Self {
            comments,
            has_more,
            failed: false,
        }
    }

    pub fn failure() -> Self {
        Self {
            comments: Vec::new(),
            has_more: false,
            failed: true,
        }
    }
}

/// Per-item result of the scrape pipeline. `degraded` is set when the retry
/// budget or the wall-clock cap stopped pagination while pages may have
/// remained.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ScrapeOutcome {
    pub comments: Vec<Comment>,
    pub comment_count: usize,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(default)]
    pub degraded: bool,
}

impl ScrapeOutcome {
    pub fn collected(mut comments: Vec<Comment>, degraded: bool, max_comments: usize) -> Self {
        comments.sort_by(|a, b| b.likes.cmp(&a.likes));
        comments.truncate(max_comments);
        Self {
            comment_count: comments.len(),
            comments,
            error: None,
            degraded,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            comments: Vec::new(),
            comment_count: 0,
            error: Some(message.into()),
            degraded: false,
        }
    }
}

#[async_trait::async_trait]
pub trait CommentFetcher: Send + Sync {
    /// Fetch one page of comments for an item. Must not fail: every error
    /// mode collapses into a `PageFetch` with `failed = true`.
    async fn fetch_page(&self, item_id: &str, count: u32, cursor: u64) -> PageFetch;
}
