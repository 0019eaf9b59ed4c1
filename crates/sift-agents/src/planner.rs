//! Plan derivation
//!
//! Turns a feed's stored analysis hints into a bounded, ordered list of
//! plan steps, then into executable tasks. Sources are consulted in strict
//! precedence: a stored analysis plan wins outright; otherwise insight
//! columns; otherwise pre-computed aggregates.

use crate::state::AgentTask;
use serde_json::json;
use sift_feed::{FeedSummary, PlanStep};

/// Derive at most `limit` plan steps from a feed summary
#[must_use]
pub fn derive_plan(summary: &FeedSummary, limit: usize) -> Vec<PlanStep> {
    let mut plan: Vec<PlanStep> = Vec::new();

    for step in &summary.analysis_plan {
        if plan.len() >= limit {
            break;
        }
        if step.has_kind_tag() {
            plan.push(step.clone());
        }
    }
    if !plan.is_empty() {
        return plan;
    }

    for column in summary.insights.keys() {
        if plan.len() >= limit {
            break;
        }
        plan.push(PlanStep::CountBy {
            column: column.clone(),
        });
    }
    if !plan.is_empty() {
        return plan;
    }

    for aggregate in &summary.aggregates {
        if plan.len() >= limit {
            break;
        }
        // The step kind inherits the aggregate's stat tag when one was
        // stored; an absent stat yields the avg_by default.
        let kind = aggregate.stat.clone().unwrap_or_else(|| "avg_by".to_string());
        let stat = aggregate.stat.clone().unwrap_or_else(|| "mean".to_string());
        let raw = json!({
            "type": kind,
            "group": aggregate.group,
            "value": aggregate.value,
            "stat": stat,
        });
        let step = serde_json::from_value(raw.clone()).unwrap_or(PlanStep::Other(raw));
        plan.push(step);
    }

    plan
}

/// Human description for one plan step
#[must_use]
pub fn task_description(step: &PlanStep) -> String {
    match step {
        PlanStep::CountBy { column } => format!("Count rows by {column}"),
        PlanStep::AvgBy { group, value, stat } | PlanStep::MeanBy { group, value, stat } => {
            format!("Aggregate {value} by {group} ({stat})")
        }
        PlanStep::Other(_) => format!("Execute plan step: {}", step.kind()),
    }
}

/// Build pending tasks for a plan, appending to any existing tasks
#[must_use]
pub fn build_tasks(plan: &[PlanStep], existing: Vec<AgentTask>) -> Vec<AgentTask> {
    let mut tasks = existing;
    for step in plan {
        tasks.push(AgentTask::new(
            step.kind(),
            task_description(step),
            step.clone(),
        ));
    }
    tasks
}
