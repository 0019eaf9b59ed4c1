//! Per-user recent-question tracking
//!
//! Questions are recorded only after their generated SQL validates, most
//! recent first, deduplicated. The rendered list feeding the prompt is a
//! shorter window than the stored one.

use dashmap::DashMap;

/// Questions kept per user
const STORED_LIMIT: usize = 50;

/// Questions rendered into a prompt
const RENDER_LIMIT: usize = 10;

/// In-memory most-recent-first question log, scoped per user
#[derive(Debug, Default)]
pub struct RecentQuestions {
    entries: DashMap<String, Vec<String>>,
}

impl RecentQuestions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a question at the front of the user's list
    pub fn record(&self, user_id: &str, question: &str) {
        let mut entries = self.entries.entry(user_id.to_string()).or_default();
        entries.retain(|existing| existing != question);
        entries.insert(0, question.to_string());
        entries.truncate(STORED_LIMIT);
    }

    /// The user's most recent questions, newest first
    #[must_use]
    pub fn list(&self, user_id: &str) -> Vec<String> {
        self.entries
            .get(user_id)
            .map(|entries| entries.iter().take(RENDER_LIMIT).cloned().collect())
            .unwrap_or_default()
    }
}
