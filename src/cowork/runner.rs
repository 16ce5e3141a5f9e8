use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::types::AgentKind;

/// Per-task soft timeout. A task that blows it is marked failed; its
/// siblings keep running.
pub const TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// The slice of a task the runner needs; the queue keeps ownership of the
/// full records.
#[derive(Debug, Clone)]
pub struct RunnerTask {
    pub id: String,
    pub description: String,
    pub agent: AgentKind,
}

#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task_id: String,
    pub success: bool,
    pub result: Option<String>,
    pub error: Option<String>,
}

/// Bounded worker pool over a caller-supplied execute function. Results come
/// back as a map; completion order is deliberately not part of the contract.
pub struct ParallelRunner {
    max_workers: usize,
    task_timeout: Duration,
}

impl ParallelRunner {
    pub fn new(max_workers: usize) -> Self {
        Self {
            max_workers: max_workers.max(1),
            task_timeout: TASK_TIMEOUT,
        }
    }

    /// Test hook; production code always runs with `TASK_TIMEOUT`.
    pub fn with_timeout(max_workers: usize, task_timeout: Duration) -> Self {
        Self {
            max_workers: max_workers.max(1),
            task_timeout,
        }
    }

    pub async fn run_tasks<F, Fut>(
        &self,
        tasks: Vec<RunnerTask>,
        execute: F,
    ) -> HashMap<String, TaskReport>
    where
        F: Fn(RunnerTask) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<String>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let timeout = self.task_timeout;
        let mut set: JoinSet<(String, Option<Result<String>>)> = JoinSet::new();

        for task in tasks {
            let semaphore = semaphore.clone();
            let execute = execute.clone();
            let task_id = task.id.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                match tokio::time::timeout(timeout, execute(task)).await {
                    Ok(result) => (task_id, Some(result)),
                    Err(_) => (task_id, None),
                }
            });
        }

        let mut reports = HashMap::new();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((id, Some(Ok(result)))) => {
                    reports.insert(
                        id.clone(),
                        TaskReport {
                            task_id: id,
                            success: true,
                            result: Some(result),
                            error: None,
                        },
                    );
                }
                Ok((id, Some(Err(e)))) => {
                    reports.insert(
                        id.clone(),
                        TaskReport {
                            task_id: id,
                            success: false,
                            result: None,
                            error: Some(e.to_string()),
                        },
                    );
                }
                Ok((id, None)) => {
                    reports.insert(
                        id.clone(),
                        TaskReport {
                            task_id: id,
                            success: false,
                            result: None,
                            error: Some(format!(
                                "Task timed out after {}s",
                                timeout.as_secs().max(1)
                            )),
                        },
                    );
                }
                Err(e) => {
                    // A panicked worker loses its id; the orchestrator treats
                    // the missing report as a failure.
                    tracing::error!(error = %e, "runner worker aborted");
                }
            }
        }
        for report in reports.values().filter(|r| !r.success) {
            tracing::warn!(task = %report.task_id, error = ?report.error, "task failed");
        }
        reports
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{ParallelRunner, RunnerTask};
    use crate::types::AgentKind;

    fn task(id: &str) -> RunnerTask {
        RunnerTask {
            id: id.to_string(),
            description: id.to_string(),
            agent: AgentKind::Tool,
        }
    }

    #[tokio::test]
    async fn all_tasks_report() {
        let runner = ParallelRunner::new(4);
        let reports = runner
            .run_tasks(vec![task("a"), task("b"), task("c")], |t| async move {
                Ok(format!("done {}", t.id))
            })
            .await;
        assert_eq!(reports.len(), 3);
        assert!(reports.values().all(|r| r.success));
        assert_eq!(reports["b"].result.as_deref(), Some("done b"));
    }

    #[tokio::test]
    async fn timeout_marks_only_the_slow_task_failed() {
        let runner = ParallelRunner::with_timeout(4, Duration::from_millis(50));
        let reports = runner
            .run_tasks(vec![task("slow"), task("fast")], |t| async move {
                if t.id == "slow" {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                }
                Ok("ok".to_string())
            })
            .await;
        assert!(!reports["slow"].success);
        assert!(reports["slow"].error.as_deref().unwrap_or("").contains("timed out"));
        assert!(reports["fast"].success);
    }

    #[tokio::test]
    async fn errors_become_failed_reports() {
        let runner = ParallelRunner::new(2);
        let reports = runner
            .run_tasks(vec![task("bad")], |_| async move {
                anyhow::bail!("exploded")
            })
            .await;
        assert!(!reports["bad"].success);
        assert_eq!(reports["bad"].error.as_deref(), Some("exploded"));
    }

    #[tokio::test]
    async fn pool_bound_is_respected() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicUsize, Ordering};

        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let runner = ParallelRunner::new(2);
        let tasks: Vec<_> = (0..6).map(|i| task(&i.to_string())).collect();
        let (active_c, peak_c) = (active.clone(), peak.clone());
        runner
            .run_tasks(tasks, move |_| {
                let active = active_c.clone();
                let peak = peak_c.clone();
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok("ok".to_string())
                }
            })
            .await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }
}
