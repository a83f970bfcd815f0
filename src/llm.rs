// src/llm.rs
//! Chat-completions client abstraction. The hosted model endpoint is opaque
//! to the rest of the backend: callers hand over messages and get text back.

use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynChatClient = Arc<dyn ChatClient>;

/// Provider config loaded from `config/ai.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// "openai" | "mock" (case-insensitive)
    pub provider: String,
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY.
    pub api_key: String,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    1024
}

impl AiConfig {
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading AI config from {}", path.display()))?;
        let mut cfg: AiConfig = serde_json::from_str(&data)?;

        cfg.provider = cfg.provider.to_lowercase();

        // Resolve api key if "ENV"
        if cfg.api_key.trim().eq_ignore_ascii_case("env") && cfg.provider != "mock" {
            cfg.api_key = std::env::var("OPENAI_API_KEY")
                .map_err(|_| anyhow!("Missing OPENAI_API_KEY env var"))?;
        }

        if !(0.0..=2.0).contains(&cfg.temperature) {
            cfg.temperature = 0.0;
        }

        Ok(cfg)
    }
}

/// Factory: build a client according to config.
pub fn build_chat_client(cfg: &AiConfig) -> Result<DynChatClient> {
    // Safe diagnostics: provider + model + key length only.
    info!(
        provider = %cfg.provider,
        model = %cfg.model,
        key_len = cfg.api_key.len(),
        "chat client configured"
    );
    match cfg.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiChatClient::new(cfg))),
        "mock" => Ok(Arc::new(MockChatClient::fixed("Mock model output"))),
        other => bail!("Unsupported provider in config: {other}"),
    }
}

/// OpenAI-compatible chat-completions provider. Requires an API key.
pub struct OpenAiChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatClient {
    pub fn new(cfg: &AiConfig) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("commentsense/0.1 (+github.com/commentsense/commentsense-backend)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }
}

#[async_trait]
impl ChatClient for OpenAiChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
            max_tokens: u32,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        if self.api_key.is_empty() {
            bail!("chat client has no API key");
        }

        let req = Req {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| Msg {
                    role: m.role.as_str(),
                    content: &m.content,
                })
                .collect(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .context("chat completion request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("chat completion returned {status}: {}", body.trim());
        }

        let body: Resp = resp.json().await.context("parsing chat completion body")?;
        let content = body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default();
        if content.is_empty() {
            bail!("chat completion returned no content");
        }
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

/// Deterministic client for tests and local runs. Replies are consumed in
/// order; the last one repeats. Every call's messages are recorded.
pub struct MockChatClient {
    replies: Mutex<Vec<String>>,
    pub seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl MockChatClient {
    pub fn fixed(reply: impl Into<String>) -> Self {
        Self::scripted(vec![reply.into()])
    }

    pub fn scripted(replies: Vec<String>) -> Self {
        Self {
            replies: Mutex::new(replies),
            seen: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.seen
            .lock()
            .expect("mock seen poisoned")
            .push(messages.to_vec());
        let mut replies = self.replies.lock().expect("mock replies poisoned");
        let reply = if replies.len() > 1 {
            replies.remove(0)
        } else {
            replies
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("mock client has no reply"))?
        };
        Ok(reply)
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// Strip markdown code fences from a model response.
pub fn strip_code_fences(response: &str) -> &str {
    response
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}
