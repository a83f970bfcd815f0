// src/summarize.rs
//! Comment categorization: hand the ranked comment set to the hosted model
//! and parse its JSON reply into typed category summaries.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::{strip_code_fences, ChatMessage, DynChatClient};
use crate::scrape::Comment;

/// One category of viewer feedback, as produced by the model and as stored.
/// Field names follow the JSON the model is instructed to emit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategorySummary {
    pub summary: String,
    #[serde(rename = "categoryCount", default)]
    pub category_count: u32,
    #[serde(rename = "commentInsights", default)]
    pub insights: Vec<String>,
    #[serde(rename = "representativeComments", default)]
    pub representative_comments: Vec<String>,
}

/// Category name -> summary. BTreeMap keeps response ordering stable.
pub type CategoryMap = BTreeMap<String, CategorySummary>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategorizedComments {
    pub categories: CategoryMap,
}

pub struct CommentSummarizer {
    client: DynChatClient,
    system_prompt: String,
}

impl CommentSummarizer {
    pub fn new(client: DynChatClient, system_prompt: impl Into<String>) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn client(&self) -> DynChatClient {
        Arc::clone(&self.client)
    }

    /// Categorize one video's ranked comments. A model reply that does not
    /// parse into the expected shape is an error the caller reports per item.
    pub async fn summarize(&self, comments: &[Comment]) -> Result<CategorizedComments> {
        let comments_block =
            serde_json::to_string_pretty(comments).context("serializing comments for the model")?;
        let messages = [
            ChatMessage::system(&self.system_prompt),
            ChatMessage::user(format!("COMMENTS:\n\n{comments_block}")),
        ];

        let raw = self.client.complete(&messages).await?;
        debug!(target: "summarize", provider = self.client.provider_name(), bytes = raw.len(), "model reply received");
        parse_categorized(&raw)
    }
}

/// Accept either the instructed wrapper object or a bare category map.
pub fn parse_categorized(raw: &str) -> Result<CategorizedComments> {
    let cleaned = strip_code_fences(raw);
    if let Ok(wrapped) = serde_json::from_str::<CategorizedComments>(cleaned) {
        return Ok(wrapped);
    }
    let categories: CategoryMap =
        serde_json::from_str(cleaned).context("parsing categorized comment summary")?;
    Ok(CategorizedComments { categories })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wrapped_and_bare_maps() {
        let wrapped = r#"{"categories": {"Positive Feedback": {"summary": "s", "categoryCount": 2, "commentInsights": ["i"], "representativeComments": ["r"]}}}"#;
        let parsed = parse_categorized(wrapped).unwrap();
        assert_eq!(parsed.categories.len(), 1);
        assert_eq!(parsed.categories["Positive Feedback"].category_count, 2);

        let bare = r#"{"Questions": {"summary": "q", "categoryCount": 1}}"#;
        let parsed = parse_categorized(bare).unwrap();
        assert!(parsed.categories["Questions"].insights.is_empty());
    }

    #[test]
    fn fenced_reply_parses() {
        let fenced = "```json\n{\"categories\": {}}\n```";
        assert!(parse_categorized(fenced).unwrap().categories.is_empty());
    }

    #[test]
    fn prose_reply_is_an_error() {
        assert!(parse_categorized("Sorry, I cannot help with that.").is_err());
    }
}
