//! SIFT Agents - the session orchestration core
//!
//! The central pipeline that:
//! - Loads a feed snapshot and derives a bounded analysis plan
//! - Executes each plan step against the feed's cached summary
//! - Distills completed results into the retrieval index
//! - Optionally answers a free-text question over retrieved context
//! - Guards session invariants and renders the final report
//!
//! # Example
//!
//! ```rust,ignore
//! use sift_agents::{SessionOrchestrator, SessionRequest};
//!
//! # async fn example(orchestrator: SessionOrchestrator) -> Result<(), Box<dyn std::error::Error>> {
//! let outcome = orchestrator
//!     .run_session(SessionRequest::new("tickets", "42").with_question("what changed?"))
//!     .await?;
//!
//! println!("{}", outcome.final_report);
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod error;
pub mod executor;
pub mod jobs;
pub mod memory;
pub mod planner;
pub mod session;
pub mod state;

pub use error::{JobError, SessionError};
pub use executor::execute_task;
pub use jobs::{
    Job, JobExecution, JobId, JobLedger, JobLogLine, JobRun, JobRunId, JobRunStatus, JobSpec,
    JobWarning, TransformBinding,
};
pub use memory::{curate, summarise_result};
pub use planner::{build_tasks, derive_plan, task_description};
pub use session::{
    render_report, OrchestratorConfig, SessionOrchestrator, SessionOutcome, SessionRequest, Stage,
};
pub use state::{
    AgentResult, AgentTask, ContextUpdate, ResultData, RunLogEntry, RunState, StagePatch, TaskId,
    TaskStatus,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
