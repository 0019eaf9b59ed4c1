//! Job-run state handling
//!
//! A job binds a feed version and optionally a transform version. Executing
//! a job opens a run, summarizes row movement from the transform's dry-run
//! report (falling back to the feed's row count), and finalizes the run
//! with structured warnings, a validation payload, and log lines. The
//! ledger is in-memory; durable job stores sit behind the same surface.

use crate::error::JobError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sift_feed::{DryRunReport, FeedStore, FeedVersionMeta};
use std::sync::Arc;
use ulid::Ulid;

/// Unique job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobId(pub Ulid);

impl JobId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique job-run identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobRunId(pub Ulid);

impl JobRunId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for JobRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobRunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request to create a job
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub name: String,
    pub feed_identifier: String,
    pub feed_version: Option<u64>,
    pub transform_name: Option<String>,
    pub transform_version: Option<u64>,
    pub schedule: Option<String>,
    pub is_active: bool,
}

impl JobSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, feed_identifier: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feed_identifier: feed_identifier.into(),
            feed_version: None,
            transform_name: None,
            transform_version: None,
            schedule: None,
            is_active: true,
        }
    }

    #[must_use]
    pub fn with_feed_version(mut self, version: u64) -> Self {
        self.feed_version = Some(version);
        self
    }

    #[must_use]
    pub fn with_transform(mut self, name: impl Into<String>, version: Option<u64>) -> Self {
        self.transform_name = Some(name.into());
        self.transform_version = version;
        self
    }

    #[must_use]
    pub fn with_schedule(mut self, schedule: impl Into<String>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }
}

/// A transform pinned to a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformBinding {
    pub name: String,
    pub version: u64,
}

/// A registered job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub user_id: String,
    pub feed: FeedVersionMeta,
    pub transform: Option<TransformBinding>,
    pub schedule: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobRunStatus {
    Running,
    Success,
    Failed,
}

/// Structured warning attached to a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobWarning {
    #[serde(rename = "type")]
    pub kind: String,
    pub details: Value,
}

/// One timestamped log line inside a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLogLine {
    pub ts: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

impl JobLogLine {
    fn info(message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            level: "info".to_string(),
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            level: "error".to_string(),
            message: message.into(),
        }
    }
}

/// One execution of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRun {
    pub id: JobRunId,
    pub job_id: JobId,
    pub status: JobRunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub rows_in: u64,
    pub rows_out: u64,
    pub warnings: Vec<JobWarning>,
    pub validation: Value,
    pub logs: Vec<JobLogLine>,
}

impl JobRun {
    fn running(job_id: JobId) -> Self {
        Self {
            id: JobRunId::new(),
            job_id,
            status: JobRunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            rows_in: 0,
            rows_out: 0,
            warnings: Vec::new(),
            validation: json!({}),
            logs: Vec::new(),
        }
    }
}

/// A finished execution: the job plus its recorded run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub job: Job,
    pub run: JobRun,
}

/// In-memory job ledger over a feed store
pub struct JobLedger {
    store: Arc<dyn FeedStore>,
    jobs: DashMap<JobId, Job>,
    runs: DashMap<JobRunId, JobRun>,
}

impl JobLedger {
    #[must_use]
    pub fn new(store: Arc<dyn FeedStore>) -> Self {
        Self {
            store,
            jobs: DashMap::new(),
            runs: DashMap::new(),
        }
    }

    /// Create a job, resolving its feed and transform referents eagerly
    ///
    /// # Errors
    /// Fails when the feed, feed version, transform, or transform version
    /// cannot be found.
    pub async fn create_job(&self, user_id: &str, spec: JobSpec) -> Result<Job, JobError> {
        let feed = self
            .store
            .feed_version(&spec.feed_identifier, spec.feed_version, user_id)
            .await?;
        let transform = match &spec.transform_name {
            Some(name) => {
                let record = self
                    .store
                    .transform_version(name, spec.transform_version, user_id)
                    .await?;
                Some(TransformBinding {
                    name: record.name,
                    version: record.version,
                })
            }
            None => None,
        };
        let job = Job {
            id: JobId::new(),
            name: spec.name,
            user_id: user_id.to_string(),
            feed,
            transform,
            schedule: spec.schedule,
            is_active: spec.is_active,
            created_at: Utc::now(),
        };
        self.jobs.insert(job.id, job.clone());
        tracing::info!(job = %job.id, name = %job.name, "created job");
        Ok(job)
    }

    /// Execute a job immediately and return the job plus its run
    ///
    /// # Errors
    /// Fails only when the job id is unknown; execution problems are
    /// recorded on the run as a `Failed` status.
    pub async fn execute_job(&self, job_id: JobId) -> Result<JobExecution, JobError> {
        let job = self
            .jobs
            .get(&job_id)
            .map(|entry| entry.value().clone())
            .ok_or(JobError::JobNotFound { id: job_id })?;

        let mut run = JobRun::running(job.id);
        self.runs.insert(run.id, run.clone());

        match self.dry_run_for(&job).await {
            Ok(report) => {
                let (rows_in, rows_out, warnings, validation) =
                    summarize_from_dry_run(report.as_ref(), job.feed.row_count);
                run.status = JobRunStatus::Success;
                run.rows_in = rows_in;
                run.rows_out = rows_out;
                run.warnings = warnings;
                run.validation = validation;
                run.logs.push(JobLogLine::info(format!(
                    "Processed rows_in={rows_in} rows_out={rows_out}"
                )));
            }
            Err(err) => {
                run.status = JobRunStatus::Failed;
                run.warnings = vec![JobWarning {
                    kind: "error".to_string(),
                    details: json!(err.to_string()),
                }];
                run.logs
                    .push(JobLogLine::error(format!("Job execution failed: {err}")));
            }
        }
        run.finished_at = Some(Utc::now());
        self.runs.insert(run.id, run.clone());
        tracing::info!(job = %job.id, run = %run.id, status = ?run.status, "job executed");
        Ok(JobExecution { job, run })
    }

    async fn dry_run_for(&self, job: &Job) -> Result<Option<DryRunReport>, JobError> {
        match &job.transform {
            Some(binding) => {
                let record = self
                    .store
                    .transform_version(&binding.name, Some(binding.version), &job.user_id)
                    .await?;
                Ok(record.dry_run)
            }
            None => Ok(None),
        }
    }

    /// Fetch one job
    pub fn get_job(&self, job_id: JobId) -> Result<Job, JobError> {
        self.jobs
            .get(&job_id)
            .map(|entry| entry.value().clone())
            .ok_or(JobError::JobNotFound { id: job_id })
    }

    /// All jobs, newest first
    #[must_use]
    pub fn list_jobs(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|entry| entry.value().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        jobs
    }

    /// Fetch one run
    pub fn get_job_run(&self, run_id: JobRunId) -> Result<JobRun, JobError> {
        self.runs
            .get(&run_id)
            .map(|entry| entry.value().clone())
            .ok_or(JobError::RunNotFound { id: run_id })
    }
}

/// Row movement, warnings, and validation payload for one run
fn summarize_from_dry_run(
    report: Option<&DryRunReport>,
    fallback_rows: u64,
) -> (u64, u64, Vec<JobWarning>, Value) {
    match report {
        Some(report) => {
            let mut warnings = Vec::new();
            if !report.columns_removed.is_empty() {
                warnings.push(JobWarning {
                    kind: "columns_removed".to_string(),
                    details: json!(report.columns_removed),
                });
            }
            (
                report.rows_before as u64,
                report.rows_after as u64,
                warnings,
                json!({"dry_run": report}),
            )
        }
        None => (fallback_rows, fallback_rows, Vec::new(), json!({})),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sift_feed::{FeedSchema, FeedSummary, FeedVersionRecord, InMemoryFeedStore, TransformRecord};

    fn store_with_feed() -> Arc<InMemoryFeedStore> {
        let store = Arc::new(InMemoryFeedStore::new());
        store.register_feed_version(
            "u1",
            "tickets",
            "Tickets",
            FeedVersionRecord {
                version: 1,
                summary: FeedSummary::default(),
                schema: FeedSchema::with_columns(["id", "status"]),
                row_count: 120,
            },
        );
        store
    }

    fn dry_run_report() -> DryRunReport {
        DryRunReport {
            rows_before: 100,
            rows_after: 90,
            row_delta: -10,
            columns_removed: vec!["junk".to_string()],
            ..DryRunReport::default()
        }
    }

    #[tokio::test]
    async fn create_job_resolves_latest_feed_version() {
        let store = store_with_feed();
        let ledger = JobLedger::new(store);

        let job = ledger
            .create_job("u1", JobSpec::new("nightly", "tickets"))
            .await
            .unwrap();
        assert_eq!(job.feed.version, 1);
        assert_eq!(job.feed.row_count, 120);
        assert!(job.transform.is_none());
    }

    #[tokio::test]
    async fn create_job_fails_on_missing_feed() {
        let ledger = JobLedger::new(store_with_feed());
        let result = ledger
            .create_job("u1", JobSpec::new("nightly", "missing"))
            .await;
        assert!(matches!(result, Err(JobError::Store(_))));
    }

    #[tokio::test]
    async fn execute_without_transform_uses_feed_row_count() {
        let ledger = JobLedger::new(store_with_feed());
        let job = ledger
            .create_job("u1", JobSpec::new("nightly", "tickets"))
            .await
            .unwrap();

        let execution = ledger.execute_job(job.id).await.unwrap();
        assert_eq!(execution.run.status, JobRunStatus::Success);
        assert_eq!(execution.run.rows_in, 120);
        assert_eq!(execution.run.rows_out, 120);
        assert!(execution.run.finished_at.is_some());
        assert_eq!(execution.run.logs.len(), 1);
        assert!(execution.run.logs[0]
            .message
            .contains("rows_in=120 rows_out=120"));
    }

    #[tokio::test]
    async fn execute_with_transform_summarizes_its_dry_run() {
        let store = store_with_feed();
        store.register_transform(
            "u1",
            TransformRecord {
                name: "clean".to_string(),
                version: 2,
                source_feed: "tickets".to_string(),
                description: None,
                definition: json!({}),
                dry_run: Some(dry_run_report()),
            },
        );
        let ledger = JobLedger::new(store);
        let job = ledger
            .create_job(
                "u1",
                JobSpec::new("nightly", "tickets").with_transform("clean", None),
            )
            .await
            .unwrap();
        assert_eq!(
            job.transform,
            Some(TransformBinding {
                name: "clean".to_string(),
                version: 2
            })
        );

        let execution = ledger.execute_job(job.id).await.unwrap();
        assert_eq!(execution.run.rows_in, 100);
        assert_eq!(execution.run.rows_out, 90);
        assert_eq!(execution.run.warnings.len(), 1);
        assert_eq!(execution.run.warnings[0].kind, "columns_removed");
        assert_eq!(
            execution.run.validation["dry_run"]["rows_after"],
            json!(90)
        );

        let fetched = ledger.get_job_run(execution.run.id).unwrap();
        assert_eq!(fetched.status, JobRunStatus::Success);
    }

    #[tokio::test]
    async fn unknown_ids_error() {
        let ledger = JobLedger::new(store_with_feed());
        assert!(matches!(
            ledger.execute_job(JobId::new()).await,
            Err(JobError::JobNotFound { .. })
        ));
        assert!(matches!(
            ledger.get_job(JobId::new()),
            Err(JobError::JobNotFound { .. })
        ));
        assert!(matches!(
            ledger.get_job_run(JobRunId::new()),
            Err(JobError::RunNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn list_jobs_is_newest_first() {
        let ledger = JobLedger::new(store_with_feed());
        let first = ledger
            .create_job("u1", JobSpec::new("a", "tickets"))
            .await
            .unwrap();
        let second = ledger
            .create_job("u1", JobSpec::new("b", "tickets"))
            .await
            .unwrap();

        let jobs = ledger.list_jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);
    }
}
