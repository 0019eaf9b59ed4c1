//! Retrieval chunks and content-derived document ids

use serde::{Deserialize, Serialize};

/// Extra metadata carried alongside a chunk
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub column_name: Option<String>,
}

/// A unit of text stored for later semantic search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub row_index: i64,
    pub chunk_type: String,
    #[serde(default)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    /// Chunk with the default metadata and chunk type
    #[must_use]
    pub fn new(text: impl Into<String>, source: impl Into<String>, row_index: i64) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
            row_index,
            chunk_type: "excel".to_string(),
            metadata: ChunkMetadata::default(),
        }
    }

    #[must_use]
    pub fn with_chunk_type(mut self, chunk_type: impl Into<String>) -> Self {
        self.chunk_type = chunk_type.into();
        self
    }

    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.metadata.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Content-derived document id: blake3 over user, source, and text
///
/// The same chunk written twice by the same user resolves to the same id,
/// which is what makes upserts idempotent overwrites.
#[must_use]
pub fn chunk_id(user_id: &str, chunk: &Chunk) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(user_id.as_bytes());
    hasher.update(chunk.source.as_bytes());
    hasher.update(chunk.text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(&digest.as_bytes()[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_stable_for_identical_content() {
        let chunk = Chunk::new("open: 3, closed: 7", "agent:tickets", 1);
        assert_eq!(chunk_id("u1", &chunk), chunk_id("u1", &chunk));
    }

    #[test]
    fn chunk_id_differs_per_user_and_text() {
        let chunk = Chunk::new("open: 3", "agent:tickets", 1);
        let other = Chunk::new("open: 4", "agent:tickets", 1);
        assert_ne!(chunk_id("u1", &chunk), chunk_id("u2", &chunk));
        assert_ne!(chunk_id("u1", &chunk), chunk_id("u1", &other));
    }

    #[test]
    fn chunk_id_is_sixteen_hex_chars() {
        let chunk = Chunk::new("text", "source", 0);
        let id = chunk_id("u1", &chunk);
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn builder_sets_type_and_tags() {
        let chunk = Chunk::new("text", "source", 2)
            .with_chunk_type("agent_summary")
            .with_tags(["agentic", "metrics"]);
        assert_eq!(chunk.chunk_type, "agent_summary");
        assert_eq!(chunk.metadata.tags, vec!["agentic", "metrics"]);
    }
}
