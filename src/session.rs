//! Benchmark sessions
//!
//! A session is a list of tasks handed out by the benchmark service. Each task is started, run,
//! its usage logged and then completed, whether or not the run succeeded; the session is
//! submitted once every task has been visited.

use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    task::{TaskError, TaskOutcome},
    usage::{UsageLedger, UsageReport},
};

/// A task as listed by the benchmark service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Unique task identifier
    pub task_id: String,

    /// Identifier of the scenario the task was generated from
    pub spec_id: String,

    /// Task description
    pub task_text: String,
}

/// Metadata for a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionRequest {
    /// Benchmark to run
    pub benchmark: String,

    /// Workspace the session belongs to
    pub workspace: String,

    /// Display name of the runner
    pub name: String,

    /// Description of the runner's architecture
    pub architecture: String,
}

/// Score awarded for a completed task.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskEvaluation {
    /// Score between 0 and 1
    pub score: f64,

    /// Evaluator explanation
    pub logs: String,
}

/// Errors from the benchmark service.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The service rejected a request.
    #[error("benchmark service error: {0}")]
    Service(String),
}

/// Remote benchmark service.
#[automock]
#[async_trait]
pub trait BenchmarkClient: Send + Sync {
    /// Open a session, returning its identifier.
    async fn start_session(&self, request: &SessionRequest) -> Result<String, SessionError>;

    /// List the tasks in a session.
    async fn session_status(&self, session_id: &str) -> Result<Vec<TaskInfo>, SessionError>;

    /// Mark a task as started.
    async fn start_task(&self, task: &TaskInfo) -> Result<(), SessionError>;

    /// Record usage for a task.
    async fn log_usage(&self, task: &TaskInfo, report: &UsageReport) -> Result<(), SessionError>;

    /// Mark a task as complete and fetch its evaluation, if one is available.
    async fn complete_task(
        &self,
        task: &TaskInfo,
    ) -> Result<Option<TaskEvaluation>, SessionError>;

    /// Submit the session for scoring.
    async fn submit_session(&self, session_id: &str) -> Result<(), SessionError>;
}

/// Runs a single benchmark task, typically by resolving its store and target and calling
/// [`crate::task::run_task`].
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run the task, recording usage in `ledger`.
    async fn execute(
        &self,
        task: &TaskInfo,
        ledger: &mut UsageLedger,
    ) -> Result<TaskOutcome, TaskError>;
}

/// Session runner options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Number of tasks to skip from the start of the session
    pub skip: usize,

    /// Model identifier reported with usage
    pub model: String,
}

/// What happened to a task in a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Skipped at the caller's request
    Skipped,

    /// A basket was committed
    Purchased,

    /// The task finished without a purchase
    Abandoned,

    /// The run failed
    Failed(String),
}

/// Per-task record of a session run.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskReport {
    /// Task identifier
    pub task_id: String,

    /// Run status
    pub status: TaskStatus,

    /// Evaluation, when the service returned one
    pub evaluation: Option<TaskEvaluation>,
}

/// Summary of a session run.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    /// Session identifier
    pub session_id: String,

    /// One report per task, in session order
    pub tasks: Vec<TaskReport>,
}

impl SessionSummary {
    /// Sum of the scores returned for the session's tasks.
    pub fn total_score(&self) -> f64 {
        self.tasks
            .iter()
            .filter_map(|task| task.evaluation.as_ref())
            .map(|evaluation| evaluation.score)
            .sum()
    }
}

/// Run every task in a new session and submit it.
///
/// A failing task does not stop the session: it is still completed so the service can score it.
///
/// # Errors
///
/// Returns a [`SessionError`] if the session cannot be started, listed, or submitted, or if a
/// task cannot be started.
pub async fn run_session<C, E>(
    client: &C,
    executor: &E,
    request: &SessionRequest,
    options: &SessionOptions,
) -> Result<SessionSummary, SessionError>
where
    C: BenchmarkClient + ?Sized,
    E: TaskExecutor + ?Sized,
{
    let session_id = client.start_session(request).await?;
    let tasks = client.session_status(&session_id).await?;

    info!(%session_id, tasks = tasks.len(), "session started");

    let mut reports = Vec::with_capacity(tasks.len());

    for (idx, task) in tasks.iter().enumerate() {
        if idx < options.skip {
            info!(idx, task_id = %task.task_id, "skipping task");

            reports.push(TaskReport {
                task_id: task.task_id.clone(),
                status: TaskStatus::Skipped,
                evaluation: None,
            });

            continue;
        }

        info!(idx, task_id = %task.task_id, spec_id = %task.spec_id, "starting task");

        client.start_task(task).await?;

        let mut ledger = UsageLedger::new();

        let status = match executor.execute(task, &mut ledger).await {
            Ok(outcome) => {
                let report = ledger.report(&options.model);

                if let Err(err) = client.log_usage(task, &report).await {
                    warn!(task_id = %task.task_id, error = %err, "failed to log usage");
                }

                if outcome.is_purchased() {
                    TaskStatus::Purchased
                } else {
                    TaskStatus::Abandoned
                }
            }
            Err(err) => {
                error!(task_id = %task.task_id, error = %err, "task run failed");

                TaskStatus::Failed(err.to_string())
            }
        };

        let evaluation = match client.complete_task(task).await {
            Ok(evaluation) => evaluation,
            Err(err) => {
                warn!(task_id = %task.task_id, error = %err, "failed to complete task");

                None
            }
        };

        if let Some(evaluation) = &evaluation {
            info!(task_id = %task.task_id, score = evaluation.score, "task scored");
        }

        reports.push(TaskReport {
            task_id: task.task_id.clone(),
            status,
            evaluation,
        });
    }

    client.submit_session(&session_id).await?;

    info!(%session_id, "session submitted");

    Ok(SessionSummary {
        session_id,
        tasks: reports,
    })
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use crate::{optimiser::Infeasibility, store::StoreError};

    use super::*;

    struct StubExecutor;

    #[async_trait]
    impl TaskExecutor for StubExecutor {
        async fn execute(
            &self,
            task: &TaskInfo,
            ledger: &mut UsageLedger,
        ) -> Result<TaskOutcome, TaskError> {
            ledger.note(format!("running {}", task.task_id));

            if task.task_id == "t-broken" {
                return Err(StoreError::api("store unavailable").into());
            }

            Ok(TaskOutcome::Abandoned {
                reason: Infeasibility::NothingRequested,
                candidates: Vec::new(),
            })
        }
    }

    fn task(task_id: &str) -> TaskInfo {
        TaskInfo {
            task_id: task_id.to_string(),
            spec_id: "soda".to_string(),
            task_text: "Buy 24 sodas".to_string(),
        }
    }

    fn request() -> SessionRequest {
        SessionRequest {
            benchmark: "store".to_string(),
            workspace: "my".to_string(),
            name: "lattice shopper".to_string(),
            architecture: "exhaustive optimiser".to_string(),
        }
    }

    fn options(skip: usize) -> SessionOptions {
        SessionOptions {
            skip,
            model: "scripted".to_string(),
        }
    }

    #[tokio::test]
    async fn failed_tasks_are_still_completed() -> TestResult {
        let mut client = MockBenchmarkClient::new();

        client
            .expect_start_session()
            .times(1)
            .returning(|_| Ok("s-1".to_string()));

        client
            .expect_session_status()
            .withf(|session_id| session_id == "s-1")
            .returning(|_| Ok(vec![task("t-ok"), task("t-broken")]));

        client.expect_start_task().times(2).returning(|_| Ok(()));

        client
            .expect_log_usage()
            .withf(|task, report| task.task_id == "t-ok" && report.model == "scripted")
            .times(1)
            .returning(|_, _| Ok(()));

        client.expect_complete_task().times(2).returning(|task| {
            Ok(Some(TaskEvaluation {
                score: if task.task_id == "t-ok" { 1.0 } else { 0.0 },
                logs: String::new(),
            }))
        });

        client
            .expect_submit_session()
            .withf(|session_id| session_id == "s-1")
            .times(1)
            .returning(|_| Ok(()));

        let summary = run_session(&client, &StubExecutor, &request(), &options(0)).await?;

        assert_eq!(summary.tasks.len(), 2);
        assert_eq!(
            summary.tasks.first().map(|task| &task.status),
            Some(&TaskStatus::Abandoned)
        );
        assert!(matches!(
            summary.tasks.get(1).map(|task| &task.status),
            Some(TaskStatus::Failed(_))
        ));
        assert!((summary.total_score() - 1.0).abs() < f64::EPSILON);

        Ok(())
    }

    #[tokio::test]
    async fn skipped_tasks_are_not_started() -> TestResult {
        let mut client = MockBenchmarkClient::new();

        client
            .expect_start_session()
            .returning(|_| Ok("s-2".to_string()));

        client
            .expect_session_status()
            .returning(|_| Ok(vec![task("t-1"), task("t-2"), task("t-3")]));

        client
            .expect_start_task()
            .withf(|task| task.task_id == "t-3")
            .times(1)
            .returning(|_| Ok(()));

        client.expect_log_usage().returning(|_, _| Ok(()));

        client
            .expect_complete_task()
            .times(1)
            .returning(|_| Err(SessionError::Service("timeout".to_string())));

        client.expect_submit_session().times(1).returning(|_| Ok(()));

        let summary = run_session(&client, &StubExecutor, &request(), &options(2)).await?;

        let statuses: Vec<&TaskStatus> = summary.tasks.iter().map(|task| &task.status).collect();

        assert_eq!(
            statuses,
            [&TaskStatus::Skipped, &TaskStatus::Skipped, &TaskStatus::Abandoned]
        );
        assert!(summary.total_score().abs() < f64::EPSILON);

        Ok(())
    }
}
