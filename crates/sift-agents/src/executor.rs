//! Task execution against the cached feed summary
//!
//! The executor never touches raw rows; it answers every task from the
//! profiled summary. A task that cannot be satisfied produces a warning
//! instead of a result. Unrecognized task kinds always produce a generic
//! result drawn from whatever profile material exists, and never warn.

use crate::state::{AgentResult, AgentTask, ResultData};
use sift_feed::{FeedSummary, PlanStep};

/// Characters of dataset text carried into a generic fallback note
const NOTE_LIMIT: usize = 400;

/// Execute one task, returning its result and any warnings
#[must_use]
pub fn execute_task(task: &AgentTask, summary: &FeedSummary) -> (Option<AgentResult>, Vec<String>) {
    let mut warnings = Vec::new();
    let result = match &task.payload {
        PlanStep::CountBy { column } => {
            let counts = summary.column_counts(column);
            if counts.is_empty() {
                warnings.push(format!("No value counts available for column '{column}'."));
                None
            } else {
                Some(AgentResult {
                    task_id: task.id,
                    kind: task.kind.clone(),
                    description: task.description.clone(),
                    data: ResultData::Counts {
                        column: column.clone(),
                        counts,
                    },
                })
            }
        }
        PlanStep::AvgBy { group, value, stat } | PlanStep::MeanBy { group, value, stat } => {
            match summary.aggregate_stats(group, value) {
                Some(aggregate) => Some(AgentResult {
                    task_id: task.id,
                    kind: task.kind.clone(),
                    description: task.description.clone(),
                    data: ResultData::Aggregate {
                        group: group.clone(),
                        value: value.clone(),
                        stat: stat.clone(),
                        best: aggregate.best.clone(),
                        worst: aggregate.worst.clone(),
                    },
                }),
                None => {
                    warnings.push(format!(
                        "No aggregate metrics found for '{value}' by '{group}'."
                    ));
                    None
                }
            }
        }
        PlanStep::Other(_) => Some(fallback_result(task, summary)),
    };
    (result, warnings)
}

/// Generic execution for unrecognized task kinds
///
/// Falls through column profiles, then relationship hints, then the dataset
/// text, then a plain note. This path always succeeds.
fn fallback_result(task: &AgentTask, summary: &FeedSummary) -> AgentResult {
    let column = task
        .payload
        .payload_str("column")
        .or_else(|| task.payload.payload_str("target"))
        .map(str::trim)
        .unwrap_or_default();

    let data = if !column.is_empty() {
        if let Some(profile) = summary.column_profile(column) {
            ResultData::Profile {
                column: column.to_string(),
                dtype: profile.dtype.clone(),
                top_values: profile.top_values.clone(),
                stats: profile.stats.clone(),
            }
        } else if let Some(details) = summary.relationships.get(column) {
            ResultData::Relationship {
                column: column.to_string(),
                details: details.clone(),
            }
        } else {
            note_fallback(task, summary)
        }
    } else {
        note_fallback(task, summary)
    };

    AgentResult {
        task_id: task.id,
        kind: task.kind.clone(),
        description: task.description.clone(),
        data,
    }
}

fn note_fallback(task: &AgentTask, summary: &FeedSummary) -> ResultData {
    match summary.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => ResultData::Note {
            note: text.chars().take(NOTE_LIMIT).collect(),
        },
        _ => ResultData::Note {
            note: format!("No structured data available for task '{}'.", task.kind),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{build_tasks, derive_plan};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use sift_feed::ValueCount;

    fn summary_from(value: serde_json::Value) -> FeedSummary {
        serde_json::from_value(value).unwrap()
    }

    fn task_for(step: serde_json::Value) -> AgentTask {
        let step: PlanStep = serde_json::from_value(step).unwrap();
        build_tasks(&[step], Vec::new()).remove(0)
    }

    #[test]
    fn count_by_copies_insight_rows_verbatim() {
        let summary = summary_from(json!({
            "insights": {"status": [
                {"label": "open", "count": 3},
                {"label": "closed", "count": 7},
            ]},
        }));
        let task = task_for(json!({"type": "count_by", "column": "status"}));
        let (result, warnings) = execute_task(&task, &summary);

        assert!(warnings.is_empty());
        let result = result.unwrap();
        assert_eq!(result.task_id, task.id);
        match result.data {
            ResultData::Counts { column, counts } => {
                assert_eq!(column, "status");
                assert_eq!(
                    counts,
                    vec![
                        ValueCount {
                            label: "open".to_string(),
                            count: 3
                        },
                        ValueCount {
                            label: "closed".to_string(),
                            count: 7
                        },
                    ]
                );
            }
            other => panic!("expected counts, got {other:?}"),
        }
    }

    #[test]
    fn count_by_without_data_warns_and_produces_nothing() {
        let summary = summary_from(json!({}));
        let task = task_for(json!({"type": "count_by", "column": "status"}));
        let (result, warnings) = execute_task(&task, &summary);

        assert!(result.is_none());
        assert_eq!(
            warnings,
            vec!["No value counts available for column 'status'.".to_string()]
        );
    }

    #[test]
    fn count_by_falls_back_to_value_counts_metric() {
        let summary = summary_from(json!({
            "metrics": [{"type": "value_counts", "column": "status",
                         "values": [{"label": "open", "count": 1}]}],
        }));
        let task = task_for(json!({"type": "count_by", "column": "status"}));
        let (result, warnings) = execute_task(&task, &summary);
        assert!(warnings.is_empty());
        assert!(result.is_some());
    }

    #[test]
    fn aggregate_requires_exact_group_value_match() {
        let summary = summary_from(json!({
            "aggregates": [{"group": "region", "value": "latency", "stat": "mean",
                            "best": [{"label": "eu", "value": 1.25}],
                            "worst": [{"label": "us", "value": 9.75}]}],
        }));
        let hit = task_for(json!({"type": "avg_by", "group": "region", "value": "latency"}));
        let (result, warnings) = execute_task(&hit, &summary);
        assert!(warnings.is_empty());
        match result.unwrap().data {
            ResultData::Aggregate { best, worst, .. } => {
                assert_eq!(best[0].label, "eu");
                assert_eq!(worst[0].label, "us");
            }
            other => panic!("expected aggregate, got {other:?}"),
        }

        let miss = task_for(json!({"type": "mean_by", "group": "region", "value": "errors"}));
        let (result, warnings) = execute_task(&miss, &summary);
        assert!(result.is_none());
        assert_eq!(
            warnings,
            vec!["No aggregate metrics found for 'errors' by 'region'.".to_string()]
        );
    }

    #[test]
    fn unknown_kind_uses_column_profile_and_never_warns() {
        let summary = summary_from(json!({
            "columns": [{"name": "created_at", "dtype": "datetime",
                         "top_values": ["2026-01-01"]}],
        }));
        let task = task_for(json!({"type": "trend", "column": "created_at"}));
        let (result, warnings) = execute_task(&task, &summary);

        assert!(warnings.is_empty());
        match result.unwrap().data {
            ResultData::Profile { column, dtype, .. } => {
                assert_eq!(column, "created_at");
                assert_eq!(dtype.as_deref(), Some("datetime"));
            }
            other => panic!("expected profile, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_falls_back_to_relationships_then_text() {
        let summary = summary_from(json!({
            "relationships": {"owner_id": {"references": "users.id"}},
            "text": "  A ticketing feed with owners.  ",
        }));
        let task = task_for(json!({"type": "lineage", "column": "owner_id"}));
        let (result, _) = execute_task(&task, &summary);
        assert!(matches!(
            result.unwrap().data,
            ResultData::Relationship { .. }
        ));

        let task = task_for(json!({"type": "lineage", "column": "unknown_col"}));
        let (result, _) = execute_task(&task, &summary);
        match result.unwrap().data {
            ResultData::Note { note } => assert_eq!(note, "A ticketing feed with owners."),
            other => panic!("expected note, got {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_with_nothing_available_still_succeeds() {
        let summary = summary_from(json!({}));
        let task = task_for(json!({"type": "trend"}));
        let (result, warnings) = execute_task(&task, &summary);

        assert!(warnings.is_empty());
        match result.unwrap().data {
            ResultData::Note { note } => {
                assert_eq!(note, "No structured data available for task 'trend'.");
            }
            other => panic!("expected note, got {other:?}"),
        }
    }

    #[test]
    fn every_executed_plan_step_traces_to_its_task() {
        let summary = summary_from(json!({
            "insights": {"status": [{"label": "open", "count": 3}]},
        }));
        let plan = derive_plan(&summary, 5);
        let tasks = build_tasks(&plan, Vec::new());
        for task in &tasks {
            let (result, _) = execute_task(task, &summary);
            if let Some(result) = result {
                assert_eq!(result.task_id, task.id);
            }
        }
    }
}
