// src/prompts.rs
//! Prompt templates are static configuration: loaded from
//! `config/prompts.toml` when present, otherwise from the copy embedded at
//! build time.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

const EMBEDDED_PROMPTS: &str = include_str!("../config/prompts.toml");

#[derive(Debug, Clone, Deserialize)]
pub struct PromptConfig {
    pub summarizer: PromptTemplate,
    pub feedback: PromptTemplate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    pub system: String,
}

impl PromptConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading prompts from {}", path.display()))?;
            return Self::parse(&content);
        }
        Self::embedded()
    }

    pub fn embedded() -> Result<Self> {
        Self::parse(EMBEDDED_PROMPTS)
    }

    fn parse(content: &str) -> Result<Self> {
        let cfg: PromptConfig = toml::from_str(content).context("parsing prompt templates")?;
        Ok(cfg)
    }
}
