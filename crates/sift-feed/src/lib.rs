//! SIFT Feed - snapshots, summaries, schemas, and transforms
//!
//! The read-only feed surface the agent core and the NL-to-SQL gate consume:
//! - Versioned feed snapshots with profiled summaries
//! - Stored feed schemas (columns, primary/foreign keys)
//! - Transform definitions and the dry-run diff engine
//! - The [`FeedStore`] seam with an in-memory implementation

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod schema;
pub mod store;
pub mod summary;
pub mod transform;

pub use schema::{FeedSchema, ForeignKey, SchemaColumn};
pub use store::{
    FeedSchemaRecord, FeedSnapshot, FeedStore, FeedStoreError, FeedVersionMeta, FeedVersionRecord,
    InMemoryFeedStore, TransformRecord,
};
pub use summary::{
    AggregateEntry, ColumnProfile, FeedSummary, MetricEntry, PlanStep, RankedValue, ValueCount,
};
pub use transform::{
    apply_steps, diff_rows, run_dry_run, DatePolicy, DryRunReport, JoinKind, KeepRule,
    LoadStrategy, Row, TransformDefinition, TransformError, TransformStep, TrimMethod, TypeChange,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
