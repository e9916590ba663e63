use chrono::{DateTime, Utc};
use roundtable_core::{CollaborationResult, RoundtableError, RoundtableResult, TaskMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifecycle status of a task.
///
/// Transitions are strictly `Pending -> Running -> {Completed | Failed}`;
/// terminal states are immutable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created but not yet picked up by a coordinating flow.
    Pending,
    /// The collaboration loop is executing.
    Running,
    /// Finished with a populated result.
    Completed,
    /// Finished with an error.
    Failed {
        /// Why the task failed.
        reason: String,
    },
}

impl TaskStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed { .. })
    }

    fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed { .. } => "failed",
        }
    }
}

/// One tracked task. Owned exclusively by [`TaskManager`]; callers only
/// ever receive immutable snapshots (clones).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Unique id, never reused (uuid v4, collision-safe across restarts).
    pub id: Uuid,
    /// The submitted prompt.
    pub prompt: String,
    /// Caller-supplied context passed to every agent call.
    pub context: String,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Fast (single round) or full execution.
    pub mode: TaskMode,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task entered `Running`.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// The collaboration result, populated on completion.
    pub result: Option<CollaborationResult>,
    /// The failure reason, populated on failure.
    pub error: Option<String>,
}

/// Owns task records and enforces the lifecycle state machine.
///
/// Out-of-order transitions (e.g. completing an already-terminal task) are
/// programming errors and return [`RoundtableError::InvalidTransition`]
/// rather than being silently ignored — silent acceptance would corrupt
/// analytics.
#[derive(Default)]
pub struct TaskManager {
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl TaskManager {
    /// Create an empty task manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new `Pending` task and return its id.
    pub async fn create_task(
        &self,
        prompt: impl Into<String>,
        context: impl Into<String>,
        mode: TaskMode,
    ) -> Uuid {
        let task = Task {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            context: context.into(),
            status: TaskStatus::Pending,
            mode,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        };
        let id = task.id;
        let mut tasks = self.tasks.write().await;
        tasks.insert(id, task);
        id
    }

    async fn transition<F>(&self, id: Uuid, to: &str, apply: F) -> RoundtableResult<()>
    where
        F: FnOnce(&mut Task) -> Result<(), &'static str>,
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(RoundtableError::TaskNotFound(id))?;
        let from = task.status.label();
        apply(task).map_err(|_| RoundtableError::InvalidTransition {
            task_id: id,
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    /// Move a task from `Pending` to `Running`.
    pub async fn mark_running(&self, id: Uuid) -> RoundtableResult<()> {
        self.transition(id, "running", |task| {
            if task.status != TaskStatus::Pending {
                return Err("not pending");
            }
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
            Ok(())
        })
        .await
    }

    /// Move a task from `Running` to `Completed` with its result.
    pub async fn mark_completed(&self, id: Uuid, result: CollaborationResult) -> RoundtableResult<()> {
        self.transition(id, "completed", |task| {
            if task.status != TaskStatus::Running {
                return Err("not running");
            }
            task.status = TaskStatus::Completed;
            task.completed_at = Some(Utc::now());
            task.result = Some(result);
            Ok(())
        })
        .await
    }

    /// Move a task from `Running` to `Failed` with its error.
    pub async fn mark_failed(&self, id: Uuid, reason: impl Into<String>) -> RoundtableResult<()> {
        let reason = reason.into();
        self.transition(id, "failed", |task| {
            if task.status != TaskStatus::Running {
                return Err("not running");
            }
            task.status = TaskStatus::Failed {
                reason: reason.clone(),
            };
            task.completed_at = Some(Utc::now());
            task.error = Some(reason);
            Ok(())
        })
        .await
    }

    /// An immutable snapshot of one task, or `TaskNotFound`.
    pub async fn get_status(&self, id: Uuid) -> RoundtableResult<Task> {
        let tasks = self.tasks.read().await;
        tasks
            .get(&id)
            .cloned()
            .ok_or(RoundtableError::TaskNotFound(id))
    }

    /// Snapshots of all non-terminal tasks, oldest first.
    pub async fn list_active(&self) -> Vec<Task> {
        let tasks = self.tasks.read().await;
        let mut active: Vec<Task> = tasks
            .values()
            .filter(|t| !t.status.is_terminal())
            .cloned()
            .collect();
        active.sort_by_key(|t| t.created_at);
        active
    }

    /// Number of non-terminal tasks.
    pub async fn active_count(&self) -> usize {
        let tasks = self.tasks.read().await;
        tasks.values().filter(|t| !t.status.is_terminal()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> CollaborationResult {
        CollaborationResult {
            final_answer: "done".to_string(),
            agent_responses: vec![],
            collaboration_log: vec![],
            total_time_ms: 1,
            confidence_score: 1.0,
            produced_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_starts_pending() {
        let manager = TaskManager::new();
        let id = manager.create_task("p", "c", TaskMode::Full).await;
        let task = manager.get_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.started_at.is_none());
        assert!(task.result.is_none());
    }

    #[tokio::test]
    async fn test_happy_path_to_completed() {
        let manager = TaskManager::new();
        let id = manager.create_task("p", "c", TaskMode::Fast).await;
        manager.mark_running(id).await.unwrap();
        assert_eq!(
            manager.get_status(id).await.unwrap().status,
            TaskStatus::Running
        );
        manager.mark_completed(id, result()).await.unwrap();
        let task = manager.get_status(id).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.result.is_some());
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failure_path_populates_error() {
        let manager = TaskManager::new();
        let id = manager.create_task("p", "c", TaskMode::Full).await;
        manager.mark_running(id).await.unwrap();
        manager.mark_failed(id, "all agents failed").await.unwrap();
        let task = manager.get_status(id).await.unwrap();
        assert!(matches!(task.status, TaskStatus::Failed { .. }));
        assert_eq!(task.error.as_deref(), Some("all agents failed"));
    }

    #[tokio::test]
    async fn test_complete_without_running_is_invalid() {
        let manager = TaskManager::new();
        let id = manager.create_task("p", "c", TaskMode::Full).await;
        let err = manager.mark_completed(id, result()).await.unwrap_err();
        assert!(matches!(err, RoundtableError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_terminal_state_is_immutable() {
        let manager = TaskManager::new();
        let id = manager.create_task("p", "c", TaskMode::Full).await;
        manager.mark_running(id).await.unwrap();
        manager.mark_completed(id, result()).await.unwrap();

        assert!(matches!(
            manager.mark_failed(id, "late").await.unwrap_err(),
            RoundtableError::InvalidTransition { .. }
        ));
        assert!(matches!(
            manager.mark_running(id).await.unwrap_err(),
            RoundtableError::InvalidTransition { .. }
        ));
        // Status unchanged by the rejected transitions
        assert_eq!(
            manager.get_status(id).await.unwrap().status,
            TaskStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_unknown_task_is_not_found() {
        let manager = TaskManager::new();
        let err = manager.get_status(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RoundtableError::TaskNotFound(_)));
        let err = manager.mark_running(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RoundtableError::TaskNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_active_excludes_terminal() {
        let manager = TaskManager::new();
        let a = manager.create_task("a", "", TaskMode::Full).await;
        let b = manager.create_task("b", "", TaskMode::Full).await;
        manager.mark_running(a).await.unwrap();
        manager.mark_completed(a, result()).await.unwrap();

        let active = manager.list_active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, b);
        assert_eq!(manager.active_count().await, 1);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let manager = TaskManager::new();
        let a = manager.create_task("a", "", TaskMode::Full).await;
        let b = manager.create_task("a", "", TaskMode::Full).await;
        assert_ne!(a, b);
    }
}
