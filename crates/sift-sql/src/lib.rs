//! SIFT SQL - natural language to validated SQL
//!
//! The translator assembles the queryable table universe from stored feeds
//! and transforms, prompts a generator (stub or model) for a candidate
//! statement, and gates the result behind a manifest-checked validator.
//! Only validated SQL should ever reach a database; rejected SQL is still
//! returned so callers can show what was attempted and why it failed.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod engine;
pub mod error;
pub mod generate;
pub mod manifest;
pub mod prompt;
pub mod recent;
pub mod validate;

pub use engine::{Nl2SqlEngine, Nl2SqlOutcome, Nl2SqlRequest};
pub use error::Nl2SqlError;
pub use generate::{clean_sql, GenerateError, SqlGenerator, StubSqlGenerator};
pub use manifest::{ManifestBuilder, ManifestKind, TableManifest};
pub use prompt::{compose_prompt, recent_block, schema_block};
pub use recent::RecentQuestions;
pub use validate::{validate_sql, ValidationOptions, ValidationResult};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
