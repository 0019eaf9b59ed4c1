//! Memory curation
//!
//! Completed results are distilled into one-line summaries. Every summary
//! becomes a context update; when the session asked for a context refresh
//! the same lines are packaged as retrieval chunks tagged with the feed.

use crate::state::{AgentResult, ContextUpdate, ResultData};
use sift_retrieval::Chunk;

/// Count pairs rendered per count summary
const COUNT_WIDTH: usize = 5;

/// Ranked pairs rendered per side of an aggregate summary
const RANK_WIDTH: usize = 3;

/// One-line textual summary of a completed result
#[must_use]
pub fn summarise_result(result: &AgentResult) -> String {
    match &result.data {
        ResultData::Counts { column, counts } => {
            let formatted = counts
                .iter()
                .take(COUNT_WIDTH)
                .map(|row| format!("{}: {}", row.label, row.count))
                .collect::<Vec<_>>()
                .join(", ");
            format!("{column}: {formatted}")
        }
        ResultData::Aggregate {
            group,
            stat,
            best,
            worst,
            ..
        } => {
            let render = |rows: &[sift_feed::RankedValue]| {
                rows.iter()
                    .take(RANK_WIDTH)
                    .map(|row| format!("{}={:.2}", row.label, row.value))
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!(
                "{stat} {group}: best [{best}] | worst [{worst}]",
                best = render(best),
                worst = render(worst)
            )
        }
        ResultData::Profile { column, .. } => {
            format!("{}: column profile for {column}", result.description)
        }
        ResultData::Relationship { column, .. } => {
            format!("{}: relationship hints for {column}", result.description)
        }
        ResultData::Note { note } => format!("{}: {note}", result.description),
    }
}

/// Context updates plus retrieval chunks for a batch of results
///
/// Chunks are numbered from one in result order so re-running the same
/// session writes the same documents.
#[must_use]
pub fn curate(
    feed_identifier: &str,
    completed: &[AgentResult],
    refresh: bool,
) -> (Vec<ContextUpdate>, Vec<Chunk>) {
    let mut updates = Vec::new();
    let mut chunks = Vec::new();
    for (idx, result) in completed.iter().enumerate() {
        let text = summarise_result(result);
        updates.push(ContextUpdate {
            task_id: result.task_id,
            text: text.clone(),
        });
        if refresh {
            chunks.push(
                Chunk::new(
                    format!("[{feed_identifier}] {text}"),
                    format!("agent:{feed_identifier}"),
                    (idx + 1) as i64,
                )
                .with_chunk_type("agent_summary")
                .with_tags(["agentic", "metrics"]),
            );
        }
    }
    (updates, chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TaskId;
    use pretty_assertions::assert_eq;
    use sift_feed::{RankedValue, ValueCount};

    fn counts_result() -> AgentResult {
        AgentResult {
            task_id: TaskId::new(),
            kind: "count_by".to_string(),
            description: "Count rows by status".to_string(),
            data: ResultData::Counts {
                column: "status".to_string(),
                counts: (0..7)
                    .map(|i| ValueCount {
                        label: format!("v{i}"),
                        count: i,
                    })
                    .collect(),
            },
        }
    }

    #[test]
    fn counts_render_at_most_five_pairs() {
        let line = summarise_result(&counts_result());
        assert!(line.starts_with("status: v0: 0, v1: 1"));
        assert!(line.contains("v4: 4"));
        assert!(!line.contains("v5"));
    }

    #[test]
    fn aggregates_render_three_ranked_pairs_at_two_decimals() {
        let result = AgentResult {
            task_id: TaskId::new(),
            kind: "avg_by".to_string(),
            description: "Aggregate latency by region (mean)".to_string(),
            data: ResultData::Aggregate {
                group: "region".to_string(),
                value: "latency".to_string(),
                stat: "mean".to_string(),
                best: (0..4)
                    .map(|i| RankedValue {
                        label: format!("b{i}"),
                        value: f64::from(i) + 0.5,
                    })
                    .collect(),
                worst: vec![RankedValue {
                    label: "w".to_string(),
                    value: 9.0,
                }],
            },
        };
        let line = summarise_result(&result);
        assert_eq!(
            line,
            "mean region: best [b0=0.50, b1=1.50, b2=2.50] | worst [w=9.00]"
        );
    }

    #[test]
    fn note_results_render_description_and_note() {
        let result = AgentResult {
            task_id: TaskId::new(),
            kind: "trend".to_string(),
            description: "Execute plan step: trend".to_string(),
            data: ResultData::Note {
                note: "No structured data available for task 'trend'.".to_string(),
            },
        };
        assert_eq!(
            summarise_result(&result),
            "Execute plan step: trend: No structured data available for task 'trend'."
        );
    }

    #[test]
    fn curate_always_records_updates_and_gates_chunks() {
        let completed = vec![counts_result()];

        let (updates, chunks) = curate("tickets", &completed, false);
        assert_eq!(updates.len(), 1);
        assert!(chunks.is_empty());

        let (updates, chunks) = curate("tickets", &completed, true);
        assert_eq!(updates.len(), 1);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("[tickets] status:"));
        assert_eq!(chunks[0].source, "agent:tickets");
        assert_eq!(chunks[0].chunk_type, "agent_summary");
        assert_eq!(chunks[0].row_index, 1);
    }

    #[test]
    fn curate_of_nothing_is_empty() {
        let (updates, chunks) = curate("tickets", &[], true);
        assert!(updates.is_empty());
        assert!(chunks.is_empty());
    }
}
