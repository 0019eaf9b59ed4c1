//! SQL generation seam and statement cleaning
//!
//! Generators turn a prompt into candidate SQL text. The stub generator
//! keeps the pipeline runnable without any model behind it. Whatever a
//! generator returns is cleaned of markdown fences and trailing commentary
//! before validation; the validator is the safety gate, not the generator.

use crate::manifest::TableManifest;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

/// Errors surfaced by SQL generators
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// The generation backend failed
    #[error("sql generation backend error: {0}")]
    Backend(String),
}

/// Proposes SQL text for a prompt
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Generate a single SQL statement for the prompt
    async fn generate(
        &self,
        prompt: &str,
        manifest: &[TableManifest],
    ) -> Result<String, GenerateError>;
}

/// Offline generator: previews the first manifest table
#[derive(Debug, Clone, Copy, Default)]
pub struct StubSqlGenerator;

#[async_trait]
impl SqlGenerator for StubSqlGenerator {
    async fn generate(
        &self,
        _prompt: &str,
        manifest: &[TableManifest],
    ) -> Result<String, GenerateError> {
        let table = manifest
            .first()
            .map_or("dual", |entry| entry.name.as_str());
        Ok(format!("SELECT * FROM {table} LIMIT 50;"))
    }
}

static FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```(?:sql)?\s*(.*?)```").expect("fence pattern is valid"));

/// Strip one markdown fence and any `-- SQL:` trailer from generated text
#[must_use]
pub fn clean_sql(raw: &str) -> String {
    let mut text = raw.trim().to_string();
    if let Some(captures) = FENCE.captures(&text) {
        if let Some(inner) = captures.get(1) {
            text = inner.as_str().trim().to_string();
        }
    }
    if let Some((head, _)) = text.split_once("-- SQL:") {
        text = head.trim().to_string();
    }
    text
}
