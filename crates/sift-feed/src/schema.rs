//! Stored feed schemas
//!
//! The profiled column layout recorded for each feed version. The manifest
//! builder reads these records to assemble the queryable table universe.

use serde::{Deserialize, Serialize};

/// One column in a stored feed schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaColumn {
    pub name: String,
    #[serde(default)]
    pub dtype: Option<String>,
}

impl SchemaColumn {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dtype: None,
        }
    }

    #[must_use]
    pub fn with_dtype(mut self, dtype: impl Into<String>) -> Self {
        self.dtype = Some(dtype.into());
        self
    }
}

/// A declared foreign-key relationship
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// Schema captured for one feed version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedSchema {
    #[serde(default)]
    pub columns: Vec<SchemaColumn>,
    #[serde(default)]
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKey>,
}

impl FeedSchema {
    /// Schema with named columns and no keys
    #[must_use]
    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(SchemaColumn::new).collect(),
            primary_keys: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Column names in declaration order
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|col| col.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_names_preserve_order() {
        let schema = FeedSchema::with_columns(["id", "status", "priority"]);
        assert_eq!(schema.column_names(), vec!["id", "status", "priority"]);
    }

    #[test]
    fn schema_deserializes_with_defaults() {
        let schema: FeedSchema = serde_json::from_str("{}").unwrap();
        assert!(schema.columns.is_empty());
        assert!(schema.primary_keys.is_empty());
    }
}
