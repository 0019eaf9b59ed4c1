//! The NL-to-SQL pipeline
//!
//! manifest -> recent questions -> retrieved context -> prompt -> generate
//! -> clean -> validate. The attempted SQL always comes back alongside its
//! validation outcome, so callers can show what was generated and why it
//! was rejected. A question joins the recent list only once its SQL
//! validates.

use crate::error::Nl2SqlError;
use crate::generate::{clean_sql, SqlGenerator};
use crate::manifest::{ManifestBuilder, TableManifest};
use crate::prompt::compose_prompt;
use crate::recent::RecentQuestions;
use crate::validate::{validate_sql, ValidationOptions, ValidationResult};
use serde::{Deserialize, Serialize};
use sift_feed::FeedStore;
use sift_retrieval::{format_context, RetrievalHit, RetrievalIndex};
use std::sync::Arc;

/// Retrieval depth for prompt context
const RAG_K: usize = 4;

/// Character budget for the retrieved-context block
const CONTEXT_CHARS: usize = 1800;

/// One NL-to-SQL invocation
#[derive(Debug, Clone)]
pub struct Nl2SqlRequest {
    pub question: String,
    pub user_id: String,
    pub feed_identifiers: Option<Vec<String>>,
    pub allow_writes: bool,
    pub dialect: String,
}

impl Nl2SqlRequest {
    #[inline]
    #[must_use]
    pub fn new(question: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            user_id: user_id.into(),
            feed_identifiers: None,
            allow_writes: false,
            dialect: "postgres".to_string(),
        }
    }

    #[inline]
    #[must_use]
    pub fn with_feeds<I, S>(mut self, feeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feed_identifiers = Some(feeds.into_iter().map(Into::into).collect());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_allow_writes(mut self, allow: bool) -> Self {
        self.allow_writes = allow;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_dialect(mut self, dialect: impl Into<String>) -> Self {
        self.dialect = dialect.into();
        self
    }
}

/// What the caller gets back: the attempted SQL plus everything needed to
/// display or audit the attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nl2SqlOutcome {
    pub sql: String,
    pub prompt: String,
    pub validation: ValidationResult,
    pub tables: Vec<String>,
    pub columns: Vec<String>,
    pub manifest: Vec<TableManifest>,
    pub recent_questions: Vec<String>,
    pub context: Vec<RetrievalHit>,
}

/// Ties the manifest builder, generator, and retrieval index together
pub struct Nl2SqlEngine {
    manifest: ManifestBuilder,
    generator: Arc<dyn SqlGenerator>,
    index: Arc<dyn RetrievalIndex>,
    recent: RecentQuestions,
}

impl Nl2SqlEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn FeedStore>,
        generator: Arc<dyn SqlGenerator>,
        index: Arc<dyn RetrievalIndex>,
    ) -> Self {
        Self {
            manifest: ManifestBuilder::new(store),
            generator,
            index,
            recent: RecentQuestions::new(),
        }
    }

    /// Translate a question into validated SQL
    ///
    /// # Errors
    /// Fails when the question is blank or the manifest cannot be built;
    /// generation and retrieval failures degrade inside the outcome.
    pub async fn nl_to_sql(&self, request: Nl2SqlRequest) -> Result<Nl2SqlOutcome, Nl2SqlError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(Nl2SqlError::MissingQuestion);
        }
        tracing::info!(user = %request.user_id, "translating question to SQL");

        let manifest = self
            .manifest
            .build(&request.user_id, request.feed_identifiers.as_deref())
            .await?;
        let recent = self.recent.list(&request.user_id);

        let (rag_context, context) = match self
            .index
            .search(question, RAG_K, &request.user_id)
            .await
        {
            Ok(hits) => (format_context(&hits, CONTEXT_CHARS), hits),
            Err(err) => {
                tracing::warn!(error = %err, "context retrieval unavailable");
                (format!("RAG unavailable: {err}"), Vec::new())
            }
        };

        let prompt = compose_prompt(question, &manifest, &recent, &rag_context);
        let raw_sql = match self.generator.generate(&prompt, &manifest).await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "sql generation failed");
                format!("SELECT '-- generation error: {err}' AS error;")
            }
        };
        let sql = clean_sql(&raw_sql);

        let validation = validate_sql(
            &sql,
            &manifest,
            &ValidationOptions::new()
                .with_allow_writes(request.allow_writes)
                .with_dialect(&request.dialect),
        );
        if validation.ok {
            self.recent.record(&request.user_id, question);
        }
        tracing::info!(
            ok = validation.ok,
            errors = validation.errors.len(),
            "sql validation finished"
        );

        Ok(Nl2SqlOutcome {
            sql,
            prompt,
            tables: validation.tables.clone(),
            columns: validation.columns.clone(),
            validation,
            manifest,
            recent_questions: recent,
            context,
        })
    }
}
