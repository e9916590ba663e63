use chrono::{DateTime, Utc};
use roundtable_core::{AgentResponse, CollaborationResult};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted while a collaborative task streams.
///
/// A stream is finite and non-restartable: exactly one `task_started` first,
/// zero or more `agent_response` events preserving round then invocation
/// order, and exactly one terminal event (`task_completed` or `task_failed`)
/// last. Dropping the receiver cancels the producer, including any in-flight
/// agent calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// The task entered execution. Always the first event.
    TaskStarted {
        /// Id of the streaming task.
        task_id: Uuid,
        /// When the event was emitted.
        timestamp: DateTime<Utc>,
        /// The submitted prompt.
        prompt: String,
    },
    /// One agent answered within a round.
    AgentResponse {
        /// Id of the streaming task.
        task_id: Uuid,
        /// When the event was emitted.
        timestamp: DateTime<Utc>,
        /// The agent's response.
        response: AgentResponse,
    },
    /// Terminal success event; always last when present.
    TaskCompleted {
        /// Id of the streaming task.
        task_id: Uuid,
        /// When the event was emitted.
        timestamp: DateTime<Utc>,
        /// The full collaboration result.
        result: CollaborationResult,
    },
    /// Terminal failure event; always last when present.
    TaskFailed {
        /// Id of the streaming task.
        task_id: Uuid,
        /// When the event was emitted.
        timestamp: DateTime<Utc>,
        /// The aggregated failure reason.
        error: String,
    },
}

impl TaskEvent {
    /// Build a `task_started` event.
    pub fn started(task_id: Uuid, prompt: impl Into<String>) -> Self {
        TaskEvent::TaskStarted {
            task_id,
            timestamp: Utc::now(),
            prompt: prompt.into(),
        }
    }

    /// Build an `agent_response` event.
    pub fn agent_response(task_id: Uuid, response: AgentResponse) -> Self {
        TaskEvent::AgentResponse {
            task_id,
            timestamp: Utc::now(),
            response,
        }
    }

    /// Build a `task_completed` event.
    pub fn completed(task_id: Uuid, result: CollaborationResult) -> Self {
        TaskEvent::TaskCompleted {
            task_id,
            timestamp: Utc::now(),
            result,
        }
    }

    /// Build a `task_failed` event.
    pub fn failed(task_id: Uuid, error: impl Into<String>) -> Self {
        TaskEvent::TaskFailed {
            task_id,
            timestamp: Utc::now(),
            error: error.into(),
        }
    }

    /// The task this event belongs to.
    pub fn task_id(&self) -> Uuid {
        match self {
            TaskEvent::TaskStarted { task_id, .. }
            | TaskEvent::AgentResponse { task_id, .. }
            | TaskEvent::TaskCompleted { task_id, .. }
            | TaskEvent::TaskFailed { task_id, .. } => *task_id,
        }
    }

    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskEvent::TaskCompleted { .. } | TaskEvent::TaskFailed { .. }
        )
    }
}
