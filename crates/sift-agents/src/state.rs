//! Run state and stage patches
//!
//! One [`RunState`] is threaded through a session. Stages never mutate it
//! directly: each returns a [`StagePatch`] that the graph runner merges.
//! A patch cannot be built without a [`RunLogEntry`], so "every stage visit
//! logs exactly one entry" holds by construction.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sift_feed::{FeedSummary, PlanStep, RankedValue, ValueCount};
use sift_retrieval::RetrievalHit;
use ulid::Ulid;

/// Unique task identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub Ulid);

impl TaskId {
    /// Generate new task ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

/// One unit of analysis work, created by the planner and drained once by
/// the executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTask {
    pub id: TaskId,
    pub kind: String,
    pub description: String,
    pub payload: PlanStep,
    pub status: TaskStatus,
}

impl AgentTask {
    #[must_use]
    pub fn new(kind: impl Into<String>, description: impl Into<String>, payload: PlanStep) -> Self {
        Self {
            id: TaskId::new(),
            kind: kind.into(),
            description: description.into(),
            payload,
            status: TaskStatus::Pending,
        }
    }
}

/// Typed payload of a completed task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultData {
    Counts {
        column: String,
        counts: Vec<ValueCount>,
    },
    Aggregate {
        group: String,
        value: String,
        stat: String,
        best: Vec<RankedValue>,
        worst: Vec<RankedValue>,
    },
    Profile {
        column: String,
        dtype: Option<String>,
        top_values: Vec<Value>,
        stats: Option<Value>,
    },
    Relationship {
        column: String,
        details: Value,
    },
    Note {
        note: String,
    },
}

/// One completed task's output; traces to exactly one task id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub task_id: TaskId,
    pub kind: String,
    pub description: String,
    pub data: ResultData,
}

/// One trace entry; every stage visit appends exactly one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub agent: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl RunLogEntry {
    #[must_use]
    pub fn new(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            message: message.into(),
            detail: None,
        }
    }

    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

/// Distilled text recorded for one result, whether or not it was embedded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextUpdate {
    pub task_id: TaskId,
    pub text: String,
}

/// The single mutable object threaded through one session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub user_id: String,
    pub feed_identifier: String,
    pub feed_name: Option<String>,
    pub feed_version: Option<u64>,
    pub summary: FeedSummary,
    pub plan: Vec<PlanStep>,
    pub tasks: Vec<AgentTask>,
    pub completed: Vec<AgentResult>,
    pub warnings: Vec<String>,
    pub run_log: Vec<RunLogEntry>,
    pub context_updates: Vec<ContextUpdate>,
    pub refresh_context: bool,
    pub question: String,
    pub answer: String,
    pub answer_sources: Vec<RetrievalHit>,
    pub final_report: String,
    pub retrieval_k: usize,
    pub max_plan_steps: usize,
}

impl RunState {
    /// Fresh state for one session invocation
    #[must_use]
    pub fn new(feed_identifier: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            feed_identifier: feed_identifier.into(),
            feed_name: None,
            feed_version: None,
            summary: FeedSummary::default(),
            plan: Vec::new(),
            tasks: Vec::new(),
            completed: Vec::new(),
            warnings: Vec::new(),
            run_log: Vec::new(),
            context_updates: Vec::new(),
            refresh_context: true,
            question: String::new(),
            answer: String::new(),
            answer_sources: Vec::new(),
            final_report: String::new(),
            retrieval_k: 6,
            max_plan_steps: 12,
        }
    }

    /// Merge one stage's patch
    ///
    /// Scalar fields overwrite when present; list fields append, except
    /// `tasks`, which is replaced so the executor can drain it.
    pub fn apply(&mut self, patch: StagePatch) {
        if let Some(feed_name) = patch.feed_name {
            self.feed_name = Some(feed_name);
        }
        if let Some(feed_version) = patch.feed_version {
            self.feed_version = Some(feed_version);
        }
        if let Some(summary) = patch.summary {
            self.summary = summary;
        }
        if let Some(plan) = patch.plan {
            self.plan = plan;
        }
        if let Some(tasks) = patch.tasks {
            self.tasks = tasks;
        }
        self.completed.extend(patch.completed);
        self.warnings.extend(patch.warnings);
        self.context_updates.extend(patch.context_updates);
        if let Some(answer) = patch.answer {
            self.answer = answer;
        }
        if let Some(sources) = patch.answer_sources {
            self.answer_sources = sources;
        }
        if let Some(report) = patch.final_report {
            self.final_report = report;
        }
        self.run_log.push(patch.log);
    }
}

/// Partial state returned by one stage visit
///
/// Construction requires the stage's log entry; there is no other way to
/// merge into [`RunState`].
#[derive(Debug, Clone)]
pub struct StagePatch {
    pub(crate) log: RunLogEntry,
    pub(crate) feed_name: Option<String>,
    pub(crate) feed_version: Option<u64>,
    pub(crate) summary: Option<FeedSummary>,
    pub(crate) plan: Option<Vec<PlanStep>>,
    pub(crate) tasks: Option<Vec<AgentTask>>,
    pub(crate) completed: Vec<AgentResult>,
    pub(crate) warnings: Vec<String>,
    pub(crate) context_updates: Vec<ContextUpdate>,
    pub(crate) answer: Option<String>,
    pub(crate) answer_sources: Option<Vec<RetrievalHit>>,
    pub(crate) final_report: Option<String>,
}

impl StagePatch {
    #[must_use]
    pub fn new(log: RunLogEntry) -> Self {
        Self {
            log,
            feed_name: None,
            feed_version: None,
            summary: None,
            plan: None,
            tasks: None,
            completed: Vec::new(),
            warnings: Vec::new(),
            context_updates: Vec::new(),
            answer: None,
            answer_sources: None,
            final_report: None,
        }
    }

    #[must_use]
    pub fn with_snapshot(mut self, name: impl Into<String>, version: u64, summary: FeedSummary) -> Self {
        self.feed_name = Some(name.into());
        self.feed_version = Some(version);
        self.summary = Some(summary);
        self
    }

    #[must_use]
    pub fn with_plan(mut self, plan: Vec<PlanStep>) -> Self {
        self.plan = Some(plan);
        self
    }

    #[must_use]
    pub fn with_tasks(mut self, tasks: Vec<AgentTask>) -> Self {
        self.tasks = Some(tasks);
        self
    }

    #[must_use]
    pub fn with_completed(mut self, completed: Vec<AgentResult>) -> Self {
        self.completed = completed;
        self
    }

    #[must_use]
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    #[must_use]
    pub fn with_context_updates(mut self, updates: Vec<ContextUpdate>) -> Self {
        self.context_updates = updates;
        self
    }

    #[must_use]
    pub fn with_answer(mut self, answer: impl Into<String>, sources: Vec<RetrievalHit>) -> Self {
        self.answer = Some(answer.into());
        self.answer_sources = Some(sources);
        self
    }

    #[must_use]
    pub fn with_final_report(mut self, report: impl Into<String>) -> Self {
        self.final_report = Some(report.into());
        self
    }
}
