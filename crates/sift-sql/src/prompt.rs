//! Prompt assembly for SQL generation
//!
//! The generator sees the manifest rendered as a schema block, the user's
//! recent questions, and whatever context retrieval produced. Generators
//! are told to use only listed tables and columns; the validator enforces
//! it afterwards.

use crate::manifest::{ManifestKind, TableManifest};

/// Render the manifest as one line per table
#[must_use]
pub fn schema_block(manifest: &[TableManifest]) -> String {
    manifest
        .iter()
        .map(|table| {
            let columns = if table.columns.is_empty() {
                "(columns unknown)".to_string()
            } else {
                table.columns.join(", ")
            };
            let keys = if table.primary_keys.is_empty() {
                "none".to_string()
            } else {
                table.primary_keys.join(", ")
            };
            let kind = match table.kind {
                ManifestKind::Feed => "feed",
                ManifestKind::Transform => "transform",
            };
            format!(
                "- {name} [{kind}] - columns: {columns}; primary keys: {keys}.",
                name = table.name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render recent questions, or a placeholder when there are none
#[must_use]
pub fn recent_block(questions: &[String]) -> String {
    if questions.is_empty() {
        return "(no recent questions)".to_string();
    }
    questions
        .iter()
        .map(|question| format!("- {question}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// The full generation prompt
#[must_use]
pub fn compose_prompt(
    question: &str,
    manifest: &[TableManifest],
    recent: &[String],
    rag_context: &str,
) -> String {
    let context = if rag_context.is_empty() {
        "(none)"
    } else {
        rag_context
    };
    format!(
        "You convert natural-language analytics questions into SQL.\n\
         Use ONLY the tables and columns listed below. Avoid guessing names.\n\
         Preserve exact column names; if a column has spaces or mixed case, wrap it in double quotes.\n\
         Output a single SQL statement, no narration, no markdown fences.\n\
         Prefer safe read-only queries (`SELECT`, `WITH`).\n\
         If asked about duplicates, use GROUP BY with HAVING COUNT(*) > 1.\n\
         Tables available:\n{schema}\n\n\
         Recent questions (for context):\n{recent}\n\n\
         Retrieved documentation:\n{context}\n\n\
         Question: {question}",
        schema = schema_block(manifest),
        recent = recent_block(recent),
    )
}
