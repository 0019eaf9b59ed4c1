//! The retrieval index seam and its in-memory implementation

use crate::chunk::{chunk_id, Chunk};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Errors surfaced by the retrieval index
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The backing store failed
    #[error("retrieval backend error: {0}")]
    Backend(String),
}

/// One search hit with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub id: String,
    pub text: String,
    pub source: String,
    pub row_index: i64,
    pub chunk_type: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub score: f64,
}

/// Upsert/search access to the shared context store
///
/// Implementations must tolerate concurrent writers for different users;
/// document keys are user-scoped and content-derived, so same-content
/// writes from one user overwrite rather than duplicate.
#[async_trait]
pub trait RetrievalIndex: Send + Sync {
    /// Insert or overwrite a batch, returning how many records were written
    async fn upsert(&self, chunks: &[Chunk], user_id: &str) -> Result<usize, RetrievalError>;

    /// Top-`k` hits for a query, best first
    async fn search(
        &self,
        query: &str,
        k: usize,
        user_id: &str,
    ) -> Result<Vec<RetrievalHit>, RetrievalError>;
}

#[derive(Debug, Clone)]
struct StoredChunk {
    id: String,
    chunk: Chunk,
}

/// In-memory [`RetrievalIndex`] with lexical-overlap scoring
///
/// Keys are `<user>:<content id>`; ordering is deterministic for a fixed
/// corpus (score descending, id ascending).
#[derive(Debug, Default)]
pub struct InMemoryRetrievalIndex {
    docs: DashMap<String, StoredChunk>,
}

impl InMemoryRetrievalIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents across all users
    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn overlap_score(query: &HashSet<String>, text: &str) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let doc = tokenize(text);
    if doc.is_empty() {
        return 0.0;
    }
    let shared = query.intersection(&doc).count();
    shared as f64 / (query.len() + doc.len() - shared) as f64
}

#[async_trait]
impl RetrievalIndex for InMemoryRetrievalIndex {
    async fn upsert(&self, chunks: &[Chunk], user_id: &str) -> Result<usize, RetrievalError> {
        if chunks.is_empty() {
            return Ok(0);
        }
        for chunk in chunks {
            let id = chunk_id(user_id, chunk);
            let key = format!("{user_id}:{id}");
            self.docs.insert(
                key,
                StoredChunk {
                    id,
                    chunk: chunk.clone(),
                },
            );
        }
        tracing::debug!(count = chunks.len(), user = user_id, "upserted chunks");
        Ok(chunks.len())
    }

    async fn search(
        &self,
        query: &str,
        k: usize,
        user_id: &str,
    ) -> Result<Vec<RetrievalHit>, RetrievalError> {
        let prefix = format!("{user_id}:");
        let tokens = tokenize(query);
        let mut hits: Vec<RetrievalHit> = self
            .docs
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| {
                let stored = entry.value();
                RetrievalHit {
                    id: stored.id.clone(),
                    text: stored.chunk.text.clone(),
                    source: stored.chunk.source.clone(),
                    row_index: stored.chunk.row_index,
                    chunk_type: stored.chunk.chunk_type.clone(),
                    tags: stored.chunk.metadata.tags.clone(),
                    score: overlap_score(&tokens, &stored.chunk.text),
                }
            })
            .filter(|hit| hit.score > 0.0)
            .collect();
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

/// Render hits as a numbered context block, bounded by `limit_chars`
#[must_use]
pub fn format_context(hits: &[RetrievalHit], limit_chars: usize) -> String {
    let mut blocks = Vec::new();
    let mut total = 0;
    for (idx, hit) in hits.iter().enumerate() {
        let segment = format!(
            "[{n}] source={source} row={row}\n{text}\n",
            n = idx + 1,
            source = hit.source,
            row = hit.row_index,
            text = hit.text
        );
        if total + segment.len() > limit_chars {
            break;
        }
        total += segment.len();
        blocks.push(segment);
    }
    blocks.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn seeded() -> InMemoryRetrievalIndex {
        InMemoryRetrievalIndex::new()
    }

    #[tokio::test]
    async fn upsert_is_idempotent_per_user() {
        let index = seeded();
        let chunks = vec![Chunk::new("status open 3", "agent:tickets", 1)];

        assert_eq!(index.upsert(&chunks, "u1").await.unwrap(), 1);
        assert_eq!(index.upsert(&chunks, "u1").await.unwrap(), 1);
        assert_eq!(index.len(), 1);

        // a different user's identical write is a separate record
        index.upsert(&chunks, "u2").await.unwrap();
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn search_is_user_scoped() {
        let index = seeded();
        index
            .upsert(&[Chunk::new("latency by region", "agent:perf", 1)], "u1")
            .await
            .unwrap();

        let mine = index.search("latency region", 5, "u1").await.unwrap();
        assert_eq!(mine.len(), 1);

        let theirs = index.search("latency region", 5, "u2").await.unwrap();
        assert!(theirs.is_empty());
    }

    #[tokio::test]
    async fn search_orders_by_score_then_id() {
        let index = seeded();
        index
            .upsert(
                &[
                    Chunk::new("status: open 3, closed 7", "agent:tickets", 1),
                    Chunk::new("priority: high 2", "agent:tickets", 2),
                ],
                "u1",
            )
            .await
            .unwrap();

        let hits = index.search("status open closed", 5, "u1").await.unwrap();
        assert!(!hits.is_empty());
        assert!(hits[0].text.contains("status"));
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn search_respects_k() {
        let index = seeded();
        let chunks: Vec<Chunk> = (0..10)
            .map(|i| Chunk::new(format!("ticket row {i}"), "agent:tickets", i))
            .collect();
        index.upsert(&chunks, "u1").await.unwrap();

        let hits = index.search("ticket row", 3, "u1").await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn format_context_numbers_and_bounds() {
        let hits = vec![
            RetrievalHit {
                id: "a".to_string(),
                text: "first".to_string(),
                source: "s1".to_string(),
                row_index: 1,
                chunk_type: "agent_summary".to_string(),
                tags: vec![],
                score: 1.0,
            },
            RetrievalHit {
                id: "b".to_string(),
                text: "second".to_string(),
                source: "s2".to_string(),
                row_index: 2,
                chunk_type: "agent_summary".to_string(),
                tags: vec![],
                score: 0.5,
            },
        ];
        let full = format_context(&hits, 500);
        assert!(full.contains("[1] source=s1 row=1"));
        assert!(full.contains("[2] source=s2 row=2"));

        let clipped = format_context(&hits, 30);
        assert!(clipped.contains("[1]"));
        assert!(!clipped.contains("[2]"));
    }
}
