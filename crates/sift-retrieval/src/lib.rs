//! SIFT Retrieval - the context store behind the agent core
//!
//! - [`Chunk`]s carry distilled text plus provenance metadata
//! - [`RetrievalIndex`] is the upsert/search seam; the in-memory
//!   implementation keys documents by user and content hash so identical
//!   writes overwrite instead of duplicating
//! - [`ChatBackend`] answers questions over retrieved context; the stub
//!   model needs no external service and the [`BackendRegistry`] hands out
//!   one shared handle per provider name

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod chat;
pub mod chunk;
pub mod index;

pub use chat::{BackendRegistry, ChatAnswer, ChatBackend, ChatError, ChatMessage, RetrievalChatModel};
pub use chunk::{chunk_id, Chunk, ChunkMetadata};
pub use index::{format_context, InMemoryRetrievalIndex, RetrievalError, RetrievalHit, RetrievalIndex};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
