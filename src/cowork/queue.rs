use crate::types::AgentKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn name(self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

#[derive(Debug, Clone)]
pub struct CoworkTask {
    pub id: String,
    pub description: String,
    pub agent: AgentKind,
    pub status: TaskStatus,
    pub result: String,
    pub dependencies: Vec<String>,
}

/// In-memory FIFO of planned tasks. Not safe for concurrent mutation: only
/// the orchestrator touches it, one phase at a time, applying the runner's
/// reports after each phase.
#[derive(Default)]
pub struct TaskQueue {
    tasks: Vec<CoworkTask>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_task(&mut self, description: impl Into<String>, agent: AgentKind) -> String {
        let id = uuid::Uuid::new_v4().simple().to_string()[..8].to_string();
        self.tasks.push(CoworkTask {
            id: id.clone(),
            description: description.into(),
            agent,
            status: TaskStatus::Pending,
            result: String::new(),
            dependencies: Vec::new(),
        });
        id
    }

    pub fn all(&self) -> &[CoworkTask] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&CoworkTask> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn mark_running(&mut self, id: &str) {
        self.transition(id, TaskStatus::Running, String::new());
    }

    pub fn mark_completed(&mut self, id: &str, result: impl Into<String>) {
        self.transition(id, TaskStatus::Completed, result.into());
    }

    pub fn mark_failed(&mut self, id: &str, error: impl Into<String>) {
        self.transition(id, TaskStatus::Failed, error.into());
    }

    /// Transitions are monotonic: PENDING→RUNNING→{COMPLETED,FAILED}.
    /// Anything else is a bug upstream and is dropped with a warning.
    fn transition(&mut self, id: &str, next: TaskStatus, result: String) {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            tracing::warn!(%id, "status update for unknown task");
            return;
        };
        let legal = matches!(
            (task.status, next),
            (TaskStatus::Pending, TaskStatus::Running)
                | (TaskStatus::Running, TaskStatus::Completed)
                | (TaskStatus::Running, TaskStatus::Failed)
        );
        if !legal {
            tracing::warn!(%id, from = task.status.name(), to = next.name(), "illegal status transition dropped");
            return;
        }
        task.status = next;
        if next.is_terminal() {
            task.result = result;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{TaskQueue, TaskStatus};
    use crate::types::AgentKind;

    #[test]
    fn lifecycle_happy_path() {
        let mut q = TaskQueue::new();
        let id = q.add_task("Seoul weather", AgentKind::Tool);
        assert_eq!(q.get(&id).unwrap().status, TaskStatus::Pending);

        q.mark_running(&id);
        assert_eq!(q.get(&id).unwrap().status, TaskStatus::Running);

        q.mark_completed(&id, "20°C");
        let task = q.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.result, "20°C");
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut q = TaskQueue::new();
        let id = q.add_task("x", AgentKind::Direct);
        q.mark_running(&id);
        q.mark_failed(&id, "boom");
        q.mark_completed(&id, "late success");
        let task = q.get(&id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.result, "boom");
    }

    #[test]
    fn result_only_set_on_terminal() {
        let mut q = TaskQueue::new();
        let id = q.add_task("x", AgentKind::Direct);
        q.mark_running(&id);
        assert!(q.get(&id).unwrap().result.is_empty());
    }

    #[test]
    fn skipping_running_is_rejected() {
        let mut q = TaskQueue::new();
        let id = q.add_task("x", AgentKind::Direct);
        q.mark_completed(&id, "no");
        assert_eq!(q.get(&id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn ids_are_short_and_unique() {
        let mut q = TaskQueue::new();
        let a = q.add_task("a", AgentKind::Tool);
        let b = q.add_task("b", AgentKind::Tool);
        assert_eq!(a.len(), 8);
        assert_ne!(a, b);
    }
}
