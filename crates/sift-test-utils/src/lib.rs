//! Testing utilities for the SIFT workspace
//!
//! Shared fixtures: seeded in-memory stores, the tickets feed used across
//! the integration suites, and pre-wired orchestrator/engine constructors.

#![allow(missing_docs)]

use serde_json::json;
use sift_agents::SessionOrchestrator;
use sift_feed::{FeedSchema, FeedSummary, FeedVersionRecord, InMemoryFeedStore, TransformRecord};
use sift_retrieval::{InMemoryRetrievalIndex, RetrievalChatModel};
use sift_sql::{Nl2SqlEngine, StubSqlGenerator};
use std::sync::Arc;

/// Initialise tracing for a test binary; safe to call more than once
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// The tickets summary used by the session scenarios
pub fn ticket_summary() -> FeedSummary {
    serde_json::from_value(json!({
        "analysis_plan": [{"type": "count_by", "column": "status"}],
        "insights": {
            "status": [
                {"label": "open", "count": 3},
                {"label": "closed", "count": 7},
            ],
        },
    }))
    .unwrap()
}

/// A tickets summary with a stored plan but no insight data to satisfy it
pub fn ticket_summary_without_insights() -> FeedSummary {
    serde_json::from_value(json!({
        "analysis_plan": [{"type": "count_by", "column": "status"}],
        "insights": {},
    }))
    .unwrap()
}

/// One registered version of the tickets feed
pub fn ticket_version(version: u64, summary: FeedSummary) -> FeedVersionRecord {
    FeedVersionRecord {
        version,
        summary,
        schema: FeedSchema::with_columns(["id", "status", "priority"]),
        row_count: 10,
    }
}

/// A feed store with the tickets feed registered for `user_id`
pub fn store_with_tickets(user_id: &str, summary: FeedSummary) -> Arc<InMemoryFeedStore> {
    let store = Arc::new(InMemoryFeedStore::new());
    store.register_feed_version(user_id, "tickets", "Tickets", ticket_version(1, summary));
    store
}

/// A parseable transform over the tickets feed
pub fn tickets_transform(version: u64) -> TransformRecord {
    TransformRecord {
        name: "clean_tickets".to_string(),
        version,
        source_feed: "tickets".to_string(),
        description: Some("Cleaned tickets".to_string()),
        definition: json!({
            "name": "clean_tickets",
            "feed_identifier": "tickets",
            "target_table": "tickets_clean",
            "steps": [{"type": "trim", "column": "status"}],
            "unique_key": ["id"],
        }),
        dry_run: None,
    }
}

/// Orchestrator wired to in-memory collaborators, plus the index handle
pub fn orchestrator_over(
    store: Arc<InMemoryFeedStore>,
) -> (SessionOrchestrator, Arc<InMemoryRetrievalIndex>) {
    let index = Arc::new(InMemoryRetrievalIndex::new());
    let chat = Arc::new(RetrievalChatModel::new(index.clone()));
    (
        SessionOrchestrator::new(store, index.clone(), chat),
        index,
    )
}

/// NL-to-SQL engine wired to the stub generator and a fresh index
pub fn engine_over(store: Arc<InMemoryFeedStore>) -> Nl2SqlEngine {
    Nl2SqlEngine::new(
        store,
        Arc::new(StubSqlGenerator),
        Arc::new(InMemoryRetrievalIndex::new()),
    )
}
