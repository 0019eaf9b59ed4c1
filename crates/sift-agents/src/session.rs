//! The session orchestration graph
//!
//! A fixed pipeline of stages runs over one [`RunState`]:
//! `bootstrap -> planner -> executor -> memory -> (qa | guard) -> guard ->
//! respond`. The only branch is after `memory`: sessions that carried a
//! non-blank question visit `qa` first. Each stage returns a [`StagePatch`];
//! the runner owns the merge, so stage functions stay pure over the state
//! they were handed.
//!
//! Only `bootstrap` may abort the session. Every other failure becomes a
//! warning and the caller still receives a final report.

use crate::error::SessionError;
use crate::executor::execute_task;
use crate::memory::{curate, summarise_result};
use crate::planner::{build_tasks, derive_plan};
use crate::state::{AgentResult, ContextUpdate, RunLogEntry, RunState, StagePatch};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sift_feed::{FeedStore, PlanStep};
use sift_retrieval::{ChatBackend, ChatMessage, RetrievalHit, RetrievalIndex};
use std::sync::Arc;

/// Stage names, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Bootstrap,
    Planner,
    Executor,
    Memory,
    Qa,
    Guard,
    Respond,
}

impl Stage {
    /// The agent name this stage writes into the run log
    #[must_use]
    pub fn log_agent(self) -> &'static str {
        match self {
            Stage::Bootstrap => "bootstrap",
            Stage::Planner => "planner",
            Stage::Executor => "executor",
            Stage::Memory => "memory",
            Stage::Qa => "qa",
            Stage::Guard => "guardrail",
            Stage::Respond => "responder",
        }
    }

    /// The next stage for the given state, `None` after `respond`
    #[must_use]
    pub fn next(self, state: &RunState) -> Option<Stage> {
        match self {
            Stage::Bootstrap => Some(Stage::Planner),
            Stage::Planner => Some(Stage::Executor),
            Stage::Executor => Some(Stage::Memory),
            Stage::Memory => Some(if needs_qa(state) {
                Stage::Qa
            } else {
                Stage::Guard
            }),
            Stage::Qa => Some(Stage::Guard),
            Stage::Guard => Some(Stage::Respond),
            Stage::Respond => None,
        }
    }

    /// Every stage this one may transition to, independent of state
    #[must_use]
    pub fn allowed_transitions(self) -> Vec<Stage> {
        match self {
            Stage::Bootstrap => vec![Stage::Planner],
            Stage::Planner => vec![Stage::Executor],
            Stage::Executor => vec![Stage::Memory],
            Stage::Memory => vec![Stage::Qa, Stage::Guard],
            Stage::Qa => vec![Stage::Guard],
            Stage::Guard => vec![Stage::Respond],
            Stage::Respond => vec![],
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.log_agent())
    }
}

/// The single branch predicate in the graph
fn needs_qa(state: &RunState) -> bool {
    !state.question.trim().is_empty()
}

/// Orchestrator-level defaults, overridable per request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Upper bound on derived plan steps
    pub max_plan_steps: usize,
    /// Retrieval depth for the QA stage
    pub retrieval_k: usize,
    /// Whether completed results are embedded for retrieval by default
    pub refresh_context: bool,
}

impl OrchestratorConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_max_plan_steps(mut self, max: usize) -> Self {
        self.max_plan_steps = max;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_refresh_context(mut self, refresh: bool) -> Self {
        self.refresh_context = refresh;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_plan_steps: 12,
            retrieval_k: 6,
            refresh_context: true,
        }
    }
}

/// One session invocation
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub feed_identifier: String,
    pub user_id: String,
    pub question: Option<String>,
    pub refresh_context: Option<bool>,
    pub max_plan_steps: Option<usize>,
    pub retrieval_k: Option<usize>,
}

impl SessionRequest {
    #[inline]
    #[must_use]
    pub fn new(feed_identifier: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            feed_identifier: feed_identifier.into(),
            user_id: user_id.into(),
            question: None,
            refresh_context: None,
            max_plan_steps: None,
            retrieval_k: None,
        }
    }

    #[inline]
    #[must_use]
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    #[inline]
    #[must_use]
    pub fn with_refresh_context(mut self, refresh: bool) -> Self {
        self.refresh_context = Some(refresh);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_max_plan_steps(mut self, max: usize) -> Self {
        self.max_plan_steps = Some(max);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = Some(k);
        self
    }
}

/// Everything a finished session hands back to the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub feed_name: Option<String>,
    pub feed_version: Option<u64>,
    pub plan: Vec<PlanStep>,
    pub completed: Vec<AgentResult>,
    pub warnings: Vec<String>,
    pub context_updates: Vec<ContextUpdate>,
    pub answer: String,
    pub answer_sources: Vec<RetrievalHit>,
    pub final_report: String,
    pub run_log: Vec<RunLogEntry>,
}

impl From<RunState> for SessionOutcome {
    fn from(state: RunState) -> Self {
        Self {
            feed_name: state.feed_name,
            feed_version: state.feed_version,
            plan: state.plan,
            completed: state.completed,
            warnings: state.warnings,
            context_updates: state.context_updates,
            answer: state.answer,
            answer_sources: state.answer_sources,
            final_report: state.final_report,
            run_log: state.run_log,
        }
    }
}

/// Runs the multi-agent session pipeline
///
/// Owns the collaborator handles and the default knobs; a single instance
/// serves any number of concurrent sessions because all per-run state lives
/// in the [`RunState`] it creates per call.
pub struct SessionOrchestrator {
    feed_store: Arc<dyn FeedStore>,
    index: Arc<dyn RetrievalIndex>,
    chat: Arc<dyn ChatBackend>,
    config: OrchestratorConfig,
}

impl SessionOrchestrator {
    #[must_use]
    pub fn new(
        feed_store: Arc<dyn FeedStore>,
        index: Arc<dyn RetrievalIndex>,
        chat: Arc<dyn ChatBackend>,
    ) -> Self {
        Self {
            feed_store,
            index,
            chat,
            config: OrchestratorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Execute the full pipeline and return the final state
    ///
    /// # Errors
    /// Fails only when the request is empty or bootstrap cannot load the
    /// feed; every downstream problem degrades into `warnings`.
    pub async fn run_session(
        &self,
        request: SessionRequest,
    ) -> Result<SessionOutcome, SessionError> {
        if request.feed_identifier.trim().is_empty() {
            return Err(SessionError::MissingFeedIdentifier);
        }
        tracing::info!(
            feed = %request.feed_identifier,
            user = %request.user_id,
            "running agent session"
        );

        let mut state = RunState::new(&request.feed_identifier, &request.user_id);
        state.question = request.question.unwrap_or_default();
        state.refresh_context = request
            .refresh_context
            .unwrap_or(self.config.refresh_context);
        state.max_plan_steps = request.max_plan_steps.unwrap_or(self.config.max_plan_steps);
        state.retrieval_k = request.retrieval_k.unwrap_or(self.config.retrieval_k);

        let mut stage = Stage::Bootstrap;
        loop {
            tracing::debug!(stage = %stage, "visiting stage");
            let patch = self.visit(stage, &state).await?;
            state.apply(patch);
            match stage.next(&state) {
                Some(next) => stage = next,
                None => break,
            }
        }

        tracing::info!(
            completed = state.completed.len(),
            warnings = state.warnings.len(),
            "agent session finished"
        );
        Ok(SessionOutcome::from(state))
    }

    async fn visit(&self, stage: Stage, state: &RunState) -> Result<StagePatch, SessionError> {
        match stage {
            Stage::Bootstrap => self.bootstrap_stage(state).await,
            Stage::Planner => Ok(self.planner_stage(state)),
            Stage::Executor => Ok(self.executor_stage(state)),
            Stage::Memory => Ok(self.memory_stage(state).await),
            Stage::Qa => Ok(self.qa_stage(state).await),
            Stage::Guard => Ok(self.guard_stage(state)),
            Stage::Respond => Ok(self.respond_stage(state)),
        }
    }

    /// Load the feed snapshot; the only stage allowed to abort the session
    async fn bootstrap_stage(&self, state: &RunState) -> Result<StagePatch, SessionError> {
        let snapshot = self
            .feed_store
            .load_snapshot(&state.feed_identifier, &state.user_id)
            .await?;
        let log = RunLogEntry::new(Stage::Bootstrap.log_agent(), "Feed summary loaded.")
            .with_detail(json!({"feed_version": snapshot.feed_version}));
        Ok(StagePatch::new(log).with_snapshot(
            snapshot.feed_name,
            snapshot.feed_version,
            snapshot.summary,
        ))
    }

    fn planner_stage(&self, state: &RunState) -> StagePatch {
        let plan = derive_plan(&state.summary, state.max_plan_steps);
        let tasks = build_tasks(&plan, state.tasks.clone());
        let log = RunLogEntry::new(
            Stage::Planner.log_agent(),
            format!("Planner produced {} steps.", plan.len()),
        );
        StagePatch::new(log).with_plan(plan).with_tasks(tasks)
    }

    /// Drain every pending task through the executor, in task order
    fn executor_stage(&self, state: &RunState) -> StagePatch {
        let mut completed: Vec<AgentResult> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();
        for task in &state.tasks {
            let (result, task_warnings) = execute_task(task, &state.summary);
            warnings.extend(task_warnings);
            if let Some(result) = result {
                completed.push(result);
            }
        }
        let log = RunLogEntry::new(
            Stage::Executor.log_agent(),
            format!("Executed {} tasks.", state.tasks.len()),
        );
        StagePatch::new(log)
            .with_completed(completed)
            .with_warnings(warnings)
            .with_tasks(Vec::new())
    }

    /// Record context updates and, when refreshing, embed result chunks
    async fn memory_stage(&self, state: &RunState) -> StagePatch {
        let (updates, chunks) = curate(
            &state.feed_identifier,
            &state.completed,
            state.refresh_context,
        );
        let mut warnings = Vec::new();
        let mut inserted = 0usize;
        if !chunks.is_empty() {
            match self.index.upsert(&chunks, &state.user_id).await {
                Ok(count) => inserted = count,
                Err(err) => {
                    tracing::warn!(error = %err, "context refresh failed");
                    warnings.push(format!("Context refresh failed: {err}"));
                }
            }
        }
        let log = RunLogEntry::new(
            Stage::Memory.log_agent(),
            format!("Memory curator processed {} results.", state.completed.len()),
        )
        .with_detail(json!({"chunks_inserted": inserted}));
        StagePatch::new(log)
            .with_context_updates(updates)
            .with_warnings(warnings)
    }

    /// Answer the caller's question; failures degrade to a warning
    async fn qa_stage(&self, state: &RunState) -> StagePatch {
        let question = state.question.trim().to_string();
        match self
            .chat
            .answer(
                &[ChatMessage::user(question)],
                state.retrieval_k,
                &state.user_id,
            )
            .await
        {
            Ok(result) => {
                let log = RunLogEntry::new(Stage::Qa.log_agent(), "Answer generated.")
                    .with_detail(json!({"sources": result.sources.len()}));
                StagePatch::new(log).with_answer(result.answer, result.sources)
            }
            Err(err) => {
                tracing::warn!(error = %err, "question answering failed");
                let log = RunLogEntry::new(Stage::Qa.log_agent(), "Question answering failed.")
                    .with_detail(json!({"error": err.to_string()}));
                StagePatch::new(log)
                    .with_answer(String::new(), Vec::new())
                    .with_warnings(vec![format!("QA agent failed: {err}")])
            }
        }
    }

    /// Session-level invariant checks; warns, never fails
    fn guard_stage(&self, state: &RunState) -> StagePatch {
        let mut warnings = Vec::new();
        if state.completed.is_empty() {
            warnings.push("No tasks completed; results may be incomplete.".to_string());
        }
        let total = state.warnings.len() + warnings.len();
        let log = RunLogEntry::new(Stage::Guard.log_agent(), "Validation complete.")
            .with_detail(json!({"warnings": total}));
        StagePatch::new(log).with_warnings(warnings)
    }

    /// Pure string rendering of the final report
    fn respond_stage(&self, state: &RunState) -> StagePatch {
        let log = RunLogEntry::new(Stage::Respond.log_agent(), "Session complete.");
        StagePatch::new(log).with_final_report(render_report(state))
    }
}

/// Render the human-readable report for a finished run
#[must_use]
pub fn render_report(state: &RunState) -> String {
    let mut lines: Vec<String> = Vec::new();
    for result in &state.completed {
        lines.push(format!(
            "- {}: {}",
            result.description,
            summarise_result(result)
        ));
    }
    if !state.answer.is_empty() {
        lines.push(String::new());
        lines.push("Answer:".to_string());
        lines.push(state.answer.clone());
    }
    if !state.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        for warning in &state.warnings {
            lines.push(format!("! {warning}"));
        }
    }
    lines.join("\n")
}
