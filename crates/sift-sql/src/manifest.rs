//! Table manifests
//!
//! The manifest is the queryable universe the SQL validator checks against:
//! one entry per feed (latest version) plus one per transform output whose
//! source feed is included. Built fresh per request, never persisted.

use serde::{Deserialize, Serialize};
use sift_feed::{
    FeedSchemaRecord, FeedStore, FeedStoreError, ForeignKey, TransformDefinition, TransformRecord,
};
use std::collections::HashSet;
use std::sync::Arc;

/// Where a manifest entry came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifestKind {
    Feed,
    Transform,
}

/// One queryable table the validator may resolve against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableManifest {
    pub name: String,
    pub columns: Vec<String>,
    pub source: String,
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub description: Option<String>,
    pub kind: ManifestKind,
}

impl TableManifest {
    /// Entry for a feed's latest stored schema
    #[must_use]
    pub fn from_feed(record: &FeedSchemaRecord) -> Self {
        Self {
            name: record.identifier.clone(),
            columns: record.schema.column_names(),
            source: format!("feed:{}:v{}", record.identifier, record.version),
            primary_keys: record.schema.primary_keys.clone(),
            foreign_keys: record.schema.foreign_keys.clone(),
            description: Some(record.display_name.clone()),
            kind: ManifestKind::Feed,
        }
    }

    /// Entry for a transform's declared output table
    ///
    /// Columns come from the first row of the latest dry-run preview; a
    /// transform with no preview still gets an entry, with empty columns.
    /// Returns `None` when the stored definition no longer parses.
    #[must_use]
    pub fn from_transform(record: &TransformRecord) -> Option<Self> {
        let definition: TransformDefinition =
            serde_json::from_value(record.definition.clone()).ok()?;
        let columns = record
            .dry_run
            .as_ref()
            .map(sift_feed::DryRunReport::output_columns)
            .unwrap_or_default();
        Some(Self {
            name: definition.target_table.clone(),
            columns,
            source: format!("transform:{}:v{}", record.name, record.version),
            primary_keys: definition.unique_key.clone().unwrap_or_default(),
            foreign_keys: Vec::new(),
            description: record
                .description
                .clone()
                .or_else(|| definition.description.clone()),
            kind: ManifestKind::Transform,
        })
    }
}

/// Assembles the manifest for one user
pub struct ManifestBuilder {
    store: Arc<dyn FeedStore>,
}

impl ManifestBuilder {
    #[must_use]
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self { store }
    }

    /// Build the manifest, optionally restricted to `feed_identifiers`
    ///
    /// Entry names are unique: later duplicates by the same identifier are
    /// skipped, and a transform never shadows a feed's name.
    ///
    /// # Errors
    /// Propagates feed-store failures; malformed transform definitions are
    /// skipped silently.
    pub async fn build(
        &self,
        user_id: &str,
        feed_identifiers: Option<&[String]>,
    ) -> Result<Vec<TableManifest>, FeedStoreError> {
        let mut manifests = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        let feeds = self.store.feed_schemas(user_id, feed_identifiers).await?;
        let mut included: Vec<String> = Vec::new();
        for record in &feeds {
            if !seen.insert(record.identifier.clone()) {
                continue;
            }
            included.push(record.identifier.clone());
            manifests.push(TableManifest::from_feed(record));
        }

        let transforms = self.store.transforms(user_id, &included).await?;
        for record in &transforms {
            let Some(manifest) = TableManifest::from_transform(record) else {
                tracing::debug!(transform = %record.name, "skipping unparseable transform definition");
                continue;
            };
            if !seen.insert(manifest.name.clone()) {
                continue;
            }
            manifests.push(manifest);
        }

        Ok(manifests)
    }
}
