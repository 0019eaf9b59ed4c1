//! Chat backends over retrieved context
//!
//! The QA stage talks to a [`ChatBackend`]; any failure there is the
//! caller's problem to degrade, never to crash on. [`RetrievalChatModel`]
//! is the offline backend: it answers strictly from retrieved context and
//! cites its sources, so the whole pipeline runs without an external model.

use crate::index::{format_context, RetrievalHit, RetrievalIndex};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Errors surfaced by chat backends
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The model/provider call failed
    #[error("chat backend error: {0}")]
    Backend(String),

    /// The request had no question to answer
    #[error("no user message to answer")]
    EmptyQuestion,
}

/// One conversational message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// An answer plus the hits that grounded it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatAnswer {
    pub answer: String,
    pub sources: Vec<RetrievalHit>,
}

/// Question answering over retrieved context
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Answer the conversation's last user message using top-`k` retrieval
    async fn answer(
        &self,
        messages: &[ChatMessage],
        k: usize,
        user_id: &str,
    ) -> Result<ChatAnswer, ChatError>;
}

/// Offline chat backend: retrieval only, no model call
pub struct RetrievalChatModel {
    index: Arc<dyn RetrievalIndex>,
    context_chars: usize,
}

impl RetrievalChatModel {
    #[must_use]
    pub fn new(index: Arc<dyn RetrievalIndex>) -> Self {
        Self {
            index,
            context_chars: 2500,
        }
    }

    #[must_use]
    pub fn with_context_chars(mut self, limit: usize) -> Self {
        self.context_chars = limit;
        self
    }
}

fn sources_block(hits: &[RetrievalHit]) -> String {
    if hits.is_empty() {
        return "No sources.".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(idx, hit)| format!("[{n}] {source} (row {row})", n = idx + 1, source = hit.source, row = hit.row_index))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl ChatBackend for RetrievalChatModel {
    async fn answer(
        &self,
        messages: &[ChatMessage],
        k: usize,
        user_id: &str,
    ) -> Result<ChatAnswer, ChatError> {
        let question = messages
            .iter()
            .rev()
            .find(|msg| msg.role == "user")
            .map(|msg| msg.content.trim())
            .filter(|content| !content.is_empty())
            .ok_or(ChatError::EmptyQuestion)?;

        let hits = self
            .index
            .search(question, k, user_id)
            .await
            .map_err(|e| ChatError::Backend(e.to_string()))?;
        let context = format_context(&hits, self.context_chars);
        let answer = if context.is_empty() {
            "(stub) No relevant context retrieved.".to_string()
        } else {
            format!(
                "(stub) Using retrieved context only:\n\n{context}\n\nSources:\n{sources}",
                sources = sources_block(&hits)
            )
        };
        tracing::debug!(hits = hits.len(), "stub chat answered from retrieval");
        Ok(ChatAnswer {
            answer,
            sources: hits,
        })
    }
}

/// Concurrency-safe map from provider name to a shared backend handle
///
/// Handles are created once per provider name and reused; registering the
/// same name twice keeps the first handle.
#[derive(Default)]
pub struct BackendRegistry {
    backends: DashMap<String, Arc<dyn ChatBackend>>,
}

impl BackendRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing handle for `provider`, or the one built by `make`
    pub fn get_or_insert_with<F>(&self, provider: &str, make: F) -> Arc<dyn ChatBackend>
    where
        F: FnOnce() -> Arc<dyn ChatBackend>,
    {
        self.backends
            .entry(provider.to_string())
            .or_insert_with(make)
            .value()
            .clone()
    }

    /// Existing handle for `provider`, if any
    #[must_use]
    pub fn get(&self, provider: &str) -> Option<Arc<dyn ChatBackend>> {
        self.backends.get(provider).map(|entry| entry.value().clone())
    }

    /// Registered provider names
    #[must_use]
    pub fn providers(&self) -> Vec<String> {
        self.backends.iter().map(|entry| entry.key().clone()).collect()
    }
}
