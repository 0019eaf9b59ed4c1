//! Error types for the agent core
//!
//! Only bootstrap conditions abort a session; everything downstream of it
//! degrades to warnings inside the run state. Job operations have their own
//! error space because they fail eagerly on missing referents.

use crate::jobs::{JobId, JobRunId};
use sift_feed::FeedStoreError;

/// Errors that abort an agent session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The request had no feed identifier
    #[error("feed_identifier is required.")]
    MissingFeedIdentifier,

    /// The feed does not exist for this user
    #[error("Feed {feed:?} not found for user.")]
    FeedNotFound { feed: String },

    /// The feed exists but has no ingested versions
    #[error("No versions available for feed {feed:?}.")]
    NoVersions { feed: String },

    /// The feed store itself failed
    #[error("feed store failure: {0}")]
    Store(String),
}

impl From<FeedStoreError> for SessionError {
    fn from(err: FeedStoreError) -> Self {
        match err {
            FeedStoreError::FeedNotFound { feed } => SessionError::FeedNotFound { feed },
            FeedStoreError::NoVersions { feed } => SessionError::NoVersions { feed },
            other => SessionError::Store(other.to_string()),
        }
    }
}

/// Errors raised by job operations
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// No job with this id
    #[error("Job {id} not found")]
    JobNotFound { id: JobId },

    /// No run with this id
    #[error("JobRun {id} not found")]
    RunNotFound { id: JobRunId },

    /// A referenced feed or transform is missing
    #[error(transparent)]
    Store(#[from] FeedStoreError),
}
