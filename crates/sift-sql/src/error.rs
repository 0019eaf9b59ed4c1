//! Error types for the NL-to-SQL path
//!
//! Validation problems are never errors here: they come back inside the
//! outcome's `ValidationResult`. Only collaborator failures that prevent a
//! manifest from being assembled abort the request.

use sift_feed::FeedStoreError;

/// Errors that abort an NL-to-SQL request
#[derive(Debug, thiserror::Error)]
pub enum Nl2SqlError {
    /// The question was blank
    #[error("question is required.")]
    MissingQuestion,

    /// The manifest could not be assembled
    #[error(transparent)]
    Store(#[from] FeedStoreError),
}
