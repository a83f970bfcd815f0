// src/agent.rs
//! Feedback agent: answers user questions about a stored video from its
//! categorized comment summaries, keeping a bounded per-session history in an
//! injected session store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::NaiveDate;
use tracing::info;

use crate::llm::{ChatMessage, DynChatClient, Role};
use crate::store::{Video, VideoCategorySummary};

/// Turns kept per session (a turn is one user/assistant message).
pub const DEFAULT_MAX_TURNS: usize = 40;

/// Explicit composite session key. The optional client token exists because
/// URL+date alone collides across users chatting about the same video on the
/// same day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(url: &str, date: NaiveDate, client_token: Option<&str>) -> Self {
        let date = date.format("%d-%m-%Y");
        match client_token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Self(format!("session_{url}_{date}_{token}")),
            None => Self(format!("session_{url}_{date}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short hash for logs; raw keys carry URLs and client tokens.
    pub fn anon(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(12);
        for b in digest.iter().take(6) {
            use std::fmt::Write as _;
            let _ = write!(&mut out, "{:02x}", b);
        }
        out
    }
}

#[derive(Debug)]
pub struct ConversationState {
    turns: Vec<ChatMessage>,
    max_turns: usize,
}

impl ConversationState {
    fn with_capacity(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns: max_turns.max(2),
        }
    }

    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.turns.push(message);
        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            self.turns.drain(0..excess);
        }
    }
}

pub trait SessionStore: Send + Sync {
    fn get_or_create(&self, key: &SessionKey) -> Arc<Mutex<ConversationState>>;
}

pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<SessionKey, Arc<Mutex<ConversationState>>>>,
    max_turns: usize,
}

impl InMemorySessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_turns,
        }
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(&self, key: &SessionKey) -> Arc<Mutex<ConversationState>> {
        let mut sessions = self.sessions.lock().expect("session map poisoned");
        Arc::clone(sessions.entry(key.clone()).or_insert_with(|| {
            Arc::new(Mutex::new(ConversationState::with_capacity(self.max_turns)))
        }))
    }
}

pub struct FeedbackAgent {
    client: DynChatClient,
    system_prompt: String,
    sessions: Arc<dyn SessionStore>,
}

impl FeedbackAgent {
    pub fn new(
        client: DynChatClient,
        system_prompt: impl Into<String>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            client,
            system_prompt: system_prompt.into(),
            sessions,
        }
    }

    /// Answer one user question about a video. Both the question and the
    /// answer are appended to the session afterwards.
    pub async fn generate_feedback(
        &self,
        video: &Video,
        categories: &[VideoCategorySummary],
        user_input: &str,
        key: &SessionKey,
        include_history: bool,
    ) -> Result<String> {
        let video_block = format!("Title: {}\nURL: {}", video.title, video.url);
        let categories_block = render_categories(categories);

        let question = format!(
            "Video Information:\n{video_block}\n\n\
             Comments Summary:\n{categories_block}\n\n\
             Based on the above information about the video and its comments, \
             please answer the following question:\n{user_input}"
        );

        let mut messages = vec![ChatMessage::system(&self.system_prompt)];
        let session = self.sessions.get_or_create(key);
        if include_history {
            let state = session.lock().expect("session state poisoned");
            messages.extend(state.turns().iter().cloned());
        }
        messages.push(ChatMessage::user(question));

        let answer = self.client.complete(&messages).await?;
        info!(
            target: "agent",
            session = %key.anon(),
            history = include_history,
            "feedback generated"
        );

        let mut state = session.lock().expect("session state poisoned");
        state.push(ChatMessage {
            role: Role::User,
            content: user_input.to_string(),
        });
        state.push(ChatMessage::assistant(answer.clone()));
        Ok(answer)
    }
}

/// Flatten stored category rows into the prompt block the model sees.
pub fn render_categories(categories: &[VideoCategorySummary]) -> String {
    categories
        .iter()
        .map(|c| {
            let parsed = c.to_category_summary();
            format!(
                "Category: {}\nCategory Count: {}\nSummary: {}\nInsights: {:?}\nRepresentative Comments: {:?}",
                c.category,
                parsed.category_count,
                parsed.summary,
                parsed.insights,
                parsed.representative_comments,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 5).unwrap()
    }

    #[test]
    fn session_key_includes_url_date_and_token() {
        let bare = SessionKey::new("https://t/video/1", date(), None);
        assert_eq!(bare.as_str(), "session_https://t/video/1_05-08-2026");
        let tokened = SessionKey::new("https://t/video/1", date(), Some("u1"));
        assert_ne!(bare, tokened);
        assert!(tokened.as_str().ends_with("_u1"));
    }

    #[test]
    fn blank_token_falls_back_to_bare_key() {
        let bare = SessionKey::new("u", date(), None);
        let blank = SessionKey::new("u", date(), Some("  "));
        assert_eq!(bare, blank);
    }

    #[test]
    fn anon_is_short_and_stable() {
        let key = SessionKey::new("u", date(), None);
        assert_eq!(key.anon().len(), 12);
        assert_eq!(key.anon(), key.anon());
    }

    #[test]
    fn conversation_history_is_bounded() {
        let mut state = ConversationState::with_capacity(4);
        for i in 0..10 {
            state.push(ChatMessage::user(format!("q{i}")));
        }
        assert_eq!(state.turns().len(), 4);
        assert_eq!(state.turns()[0].content, "q6");
    }
}
