//! The feed store seam
//!
//! The agent core and the manifest builder never own persistence; they read
//! feed versions, schemas, and transform records through [`FeedStore`]. The
//! in-memory implementation backs tests and single-process deployments.

use crate::schema::FeedSchema;
use crate::summary::FeedSummary;
use crate::transform::DryRunReport;
use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors surfaced by feed-store lookups
#[derive(Debug, thiserror::Error)]
pub enum FeedStoreError {
    /// The feed does not exist for this user
    #[error("Feed {feed:?} not found for user.")]
    FeedNotFound { feed: String },

    /// The feed exists but has no ingested versions
    #[error("No versions available for feed {feed:?}.")]
    NoVersions { feed: String },

    /// The named transform does not exist for this user
    #[error("Transform {name:?} not found for user.")]
    TransformNotFound { name: String },

    /// A backing store failed
    #[error("feed store backend error: {0}")]
    Backend(String),
}

/// Read-only view of one feed version, the agent core's sole input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSnapshot {
    pub feed_name: String,
    pub feed_version: u64,
    pub summary: FeedSummary,
}

/// Everything recorded for one ingested feed version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedVersionRecord {
    pub version: u64,
    pub summary: FeedSummary,
    pub schema: FeedSchema,
    pub row_count: u64,
}

/// Lightweight version metadata for job binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedVersionMeta {
    pub identifier: String,
    pub version: u64,
    pub row_count: u64,
}

/// A feed's latest schema, as the manifest builder consumes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedSchemaRecord {
    pub identifier: String,
    pub display_name: String,
    pub version: u64,
    pub schema: FeedSchema,
}

/// A stored transform version
///
/// `definition` stays raw JSON on purpose: definitions written by older
/// clients may no longer parse, and the manifest builder skips those.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub name: String,
    pub version: u64,
    pub source_feed: String,
    #[serde(default)]
    pub description: Option<String>,
    pub definition: Value,
    #[serde(default)]
    pub dry_run: Option<DryRunReport>,
}

/// Read-only access to stored feeds and transforms
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Load the latest snapshot of a feed
    async fn load_snapshot(
        &self,
        feed_identifier: &str,
        user_id: &str,
    ) -> Result<FeedSnapshot, FeedStoreError>;

    /// Latest schema per distinct feed, optionally restricted to identifiers
    async fn feed_schemas(
        &self,
        user_id: &str,
        feeds: Option<&[String]>,
    ) -> Result<Vec<FeedSchemaRecord>, FeedStoreError>;

    /// Latest transform record per transform whose source feed is included
    async fn transforms(
        &self,
        user_id: &str,
        source_feeds: &[String],
    ) -> Result<Vec<TransformRecord>, FeedStoreError>;

    /// Resolve a feed version (explicit, or latest when `None`)
    async fn feed_version(
        &self,
        feed_identifier: &str,
        version: Option<u64>,
        user_id: &str,
    ) -> Result<FeedVersionMeta, FeedStoreError>;

    /// Resolve a transform version (explicit, or latest when `None`)
    async fn transform_version(
        &self,
        name: &str,
        version: Option<u64>,
        user_id: &str,
    ) -> Result<TransformRecord, FeedStoreError>;
}

#[derive(Debug, Clone, Default)]
struct FeedEntry {
    display_name: String,
    versions: Vec<FeedVersionRecord>,
}

/// In-memory [`FeedStore`] keyed per user
///
/// Feed insertion order is preserved per user so manifest output is
/// deterministic for a fixed registration sequence.
#[derive(Debug, Default)]
pub struct InMemoryFeedStore {
    feeds: DashMap<String, IndexMap<String, FeedEntry>>,
    transforms: DashMap<String, IndexMap<String, Vec<TransformRecord>>>,
}

impl InMemoryFeedStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one ingested feed version
    pub fn register_feed_version(
        &self,
        user_id: &str,
        identifier: &str,
        display_name: &str,
        record: FeedVersionRecord,
    ) {
        let mut feeds = self.feeds.entry(user_id.to_string()).or_default();
        let entry = feeds.entry(identifier.to_string()).or_default();
        entry.display_name = display_name.to_string();
        entry.versions.push(record);
        entry.versions.sort_by_key(|version| version.version);
    }

    /// Register a feed with no versions yet
    pub fn register_feed(&self, user_id: &str, identifier: &str, display_name: &str) {
        let mut feeds = self.feeds.entry(user_id.to_string()).or_default();
        let entry = feeds.entry(identifier.to_string()).or_default();
        entry.display_name = display_name.to_string();
    }

    /// Register one stored transform version
    pub fn register_transform(&self, user_id: &str, record: TransformRecord) {
        let mut transforms = self.transforms.entry(user_id.to_string()).or_default();
        let versions = transforms.entry(record.name.clone()).or_default();
        versions.push(record);
        versions.sort_by_key(|version| version.version);
    }

    fn latest_version(
        &self,
        user_id: &str,
        identifier: &str,
    ) -> Result<(String, FeedVersionRecord), FeedStoreError> {
        let feeds = self
            .feeds
            .get(user_id)
            .ok_or_else(|| FeedStoreError::FeedNotFound {
                feed: identifier.to_string(),
            })?;
        let entry = feeds
            .get(identifier)
            .ok_or_else(|| FeedStoreError::FeedNotFound {
                feed: identifier.to_string(),
            })?;
        let latest = entry
            .versions
            .last()
            .cloned()
            .ok_or_else(|| FeedStoreError::NoVersions {
                feed: identifier.to_string(),
            })?;
        Ok((entry.display_name.clone(), latest))
    }
}

#[async_trait]
impl FeedStore for InMemoryFeedStore {
    async fn load_snapshot(
        &self,
        feed_identifier: &str,
        user_id: &str,
    ) -> Result<FeedSnapshot, FeedStoreError> {
        let (display_name, latest) = self.latest_version(user_id, feed_identifier)?;
        Ok(FeedSnapshot {
            feed_name: display_name,
            feed_version: latest.version,
            summary: latest.summary,
        })
    }

    async fn feed_schemas(
        &self,
        user_id: &str,
        feeds: Option<&[String]>,
    ) -> Result<Vec<FeedSchemaRecord>, FeedStoreError> {
        let Some(entries) = self.feeds.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut records = Vec::new();
        for (identifier, entry) in entries.iter() {
            if let Some(filter) = feeds {
                if !filter.iter().any(|wanted| wanted == identifier) {
                    continue;
                }
            }
            let Some(latest) = entry.versions.last() else {
                continue;
            };
            records.push(FeedSchemaRecord {
                identifier: identifier.clone(),
                display_name: entry.display_name.clone(),
                version: latest.version,
                schema: latest.schema.clone(),
            });
        }
        Ok(records)
    }

    async fn transforms(
        &self,
        user_id: &str,
        source_feeds: &[String],
    ) -> Result<Vec<TransformRecord>, FeedStoreError> {
        let Some(entries) = self.transforms.get(user_id) else {
            return Ok(Vec::new());
        };
        let mut records = Vec::new();
        for versions in entries.values() {
            let Some(latest) = versions.last() else {
                continue;
            };
            if source_feeds.iter().any(|feed| *feed == latest.source_feed) {
                records.push(latest.clone());
            }
        }
        Ok(records)
    }

    async fn feed_version(
        &self,
        feed_identifier: &str,
        version: Option<u64>,
        user_id: &str,
    ) -> Result<FeedVersionMeta, FeedStoreError> {
        let feeds = self
            .feeds
            .get(user_id)
            .ok_or_else(|| FeedStoreError::FeedNotFound {
                feed: feed_identifier.to_string(),
            })?;
        let entry = feeds
            .get(feed_identifier)
            .ok_or_else(|| FeedStoreError::FeedNotFound {
                feed: feed_identifier.to_string(),
            })?;
        let resolved = match version {
            Some(wanted) => entry.versions.iter().find(|v| v.version == wanted),
            None => entry.versions.last(),
        };
        let resolved = resolved.ok_or_else(|| FeedStoreError::NoVersions {
            feed: feed_identifier.to_string(),
        })?;
        Ok(FeedVersionMeta {
            identifier: feed_identifier.to_string(),
            version: resolved.version,
            row_count: resolved.row_count,
        })
    }

    async fn transform_version(
        &self,
        name: &str,
        version: Option<u64>,
        user_id: &str,
    ) -> Result<TransformRecord, FeedStoreError> {
        let entries = self
            .transforms
            .get(user_id)
            .ok_or_else(|| FeedStoreError::TransformNotFound {
                name: name.to_string(),
            })?;
        let versions = entries
            .get(name)
            .ok_or_else(|| FeedStoreError::TransformNotFound {
                name: name.to_string(),
            })?;
        let resolved = match version {
            Some(wanted) => versions.iter().find(|v| v.version == wanted),
            None => versions.last(),
        };
        resolved
            .cloned()
            .ok_or_else(|| FeedStoreError::TransformNotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FeedSchema;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn version(version: u64, rows: u64) -> FeedVersionRecord {
        FeedVersionRecord {
            version,
            summary: FeedSummary::default(),
            schema: FeedSchema::with_columns(["id", "status"]),
            row_count: rows,
        }
    }

    #[tokio::test]
    async fn snapshot_uses_latest_version() {
        let store = InMemoryFeedStore::new();
        store.register_feed_version("u1", "tickets", "Tickets", version(1, 10));
        store.register_feed_version("u1", "tickets", "Tickets", version(2, 12));

        let snapshot = store.load_snapshot("tickets", "u1").await.unwrap();
        assert_eq!(snapshot.feed_version, 2);
        assert_eq!(snapshot.feed_name, "Tickets");
    }

    #[tokio::test]
    async fn missing_feed_and_missing_versions_are_distinct() {
        let store = InMemoryFeedStore::new();
        store.register_feed("u1", "empty", "Empty");

        let missing = store.load_snapshot("nope", "u1").await;
        assert!(matches!(missing, Err(FeedStoreError::FeedNotFound { .. })));

        let versionless = store.load_snapshot("empty", "u1").await;
        assert!(matches!(versionless, Err(FeedStoreError::NoVersions { .. })));
    }

    #[tokio::test]
    async fn snapshots_are_scoped_per_user() {
        let store = InMemoryFeedStore::new();
        store.register_feed_version("u1", "tickets", "Tickets", version(1, 10));

        let other = store.load_snapshot("tickets", "u2").await;
        assert!(matches!(other, Err(FeedStoreError::FeedNotFound { .. })));
    }

    #[tokio::test]
    async fn feed_schemas_filter_and_take_latest() {
        let store = InMemoryFeedStore::new();
        store.register_feed_version("u1", "tickets", "Tickets", version(1, 10));
        store.register_feed_version("u1", "tickets", "Tickets", version(3, 30));
        store.register_feed_version("u1", "orders", "Orders", version(1, 5));

        let all = store.feed_schemas("u1", None).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].version, 3);

        let filter = vec!["orders".to_string()];
        let only = store.feed_schemas("u1", Some(&filter)).await.unwrap();
        assert_eq!(only.len(), 1);
        assert_eq!(only[0].identifier, "orders");
    }

    #[tokio::test]
    async fn transforms_are_restricted_to_source_feeds() {
        let store = InMemoryFeedStore::new();
        store.register_transform(
            "u1",
            TransformRecord {
                name: "clean".to_string(),
                version: 1,
                source_feed: "tickets".to_string(),
                description: None,
                definition: json!({}),
                dry_run: None,
            },
        );
        store.register_transform(
            "u1",
            TransformRecord {
                name: "clean".to_string(),
                version: 2,
                source_feed: "tickets".to_string(),
                description: None,
                definition: json!({"v": 2}),
                dry_run: None,
            },
        );

        let hits = store
            .transforms("u1", &["tickets".to_string()])
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].version, 2);

        let none = store.transforms("u1", &["orders".to_string()]).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn feed_version_resolves_explicit_and_latest() {
        let store = InMemoryFeedStore::new();
        store.register_feed_version("u1", "tickets", "Tickets", version(1, 10));
        store.register_feed_version("u1", "tickets", "Tickets", version(2, 20));

        let latest = store.feed_version("tickets", None, "u1").await.unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.row_count, 20);

        let pinned = store.feed_version("tickets", Some(1), "u1").await.unwrap();
        assert_eq!(pinned.row_count, 10);

        let gone = store.feed_version("tickets", Some(9), "u1").await;
        assert!(matches!(gone, Err(FeedStoreError::NoVersions { .. })));
    }
}
