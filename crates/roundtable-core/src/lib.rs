//! Core types and error definitions for the roundtable orchestrator.
//!
//! This crate provides the foundational types shared across all roundtable
//! crates: the error taxonomy, agent roles, and the value types produced by
//! a collaborative run.
//!
//! # Main types
//!
//! - [`RoundtableError`] — Typed error taxonomy for agents and orchestration.
//! - [`RoundtableResult`] — Convenience alias for `Result<T, RoundtableError>`.
//! - [`AgentRole`] — The role an agent plays within a collaboration round.
//! - [`TaskMode`] — Fast (single round) or full (iterative) execution.
//! - [`AgentResponse`] — One agent's answer within one round.
//! - [`CollaborationResult`] — The aggregated outcome of a collaborative task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Error types ---

/// Top-level error type for the roundtable framework.
///
/// Per-agent variants (`AgentUnavailable`, `AgentTimeout`, `AgentProtocol`)
/// are always handled locally by the collaboration loop and recorded in the
/// collaboration log; they only surface to callers when every agent in the
/// final attempted round fails. `InvalidTransition` marks a task state
/// machine violation and must never be swallowed.
#[derive(Debug, thiserror::Error)]
pub enum RoundtableError {
    /// The agent's backend is unreachable or reported itself unavailable.
    #[error("agent '{agent}' unavailable: {reason}")]
    AgentUnavailable {
        /// Name of the agent that could not be reached.
        agent: String,
        /// Backend-provided detail.
        reason: String,
    },

    /// A per-agent call exceeded its deadline.
    #[error("agent '{agent}' timed out after {elapsed_ms}ms")]
    AgentTimeout {
        /// Name of the agent that timed out.
        agent: String,
        /// Time spent waiting before the deadline fired.
        elapsed_ms: u64,
    },

    /// The agent's backend returned a malformed or unexpected response.
    #[error("agent '{agent}' protocol error: {detail}")]
    AgentProtocol {
        /// Name of the misbehaving agent.
        agent: String,
        /// What was wrong with the response.
        detail: String,
    },

    /// The orchestrator could not run the task at all (e.g. no usable
    /// agents) or every agent in the final attempted round failed.
    #[error("orchestration error: {0}")]
    Orchestration(String),

    /// A status query referenced an unknown task id.
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    /// An out-of-order task state transition. This is a programming error
    /// in the coordinating flow, not a runtime condition to retry.
    #[error("invalid task transition for {task_id}: {from} -> {to}")]
    InvalidTransition {
        /// The task whose state machine was violated.
        task_id: Uuid,
        /// Status the task was in.
        from: String,
        /// Status the caller tried to move it to.
        to: String,
    },

    /// The task was cancelled before reaching a natural terminal state.
    #[error("task cancelled")]
    Cancelled,

    /// An error from an outbound HTTP request.
    #[error("http error: {0}")]
    Http(String),

    /// An error in configuration parsing or validation.
    #[error("config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`RoundtableError`].
pub type RoundtableResult<T> = Result<T, RoundtableError>;

// --- Collaboration types ---

/// The role an agent plays in the collaboration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Drafts candidate answers.
    Proposer,
    /// Challenges and stress-tests the current draft.
    Critic,
    /// Brings supporting facts and references.
    Researcher,
    /// Merges the round's responses; its last-round answer is preferred
    /// when producing the final answer.
    Synthesizer,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentRole::Proposer => write!(f, "proposer"),
            AgentRole::Critic => write!(f, "critic"),
            AgentRole::Researcher => write!(f, "researcher"),
            AgentRole::Synthesizer => write!(f, "synthesizer"),
        }
    }
}

/// Execution mode for a collaborative task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Exactly one round, regardless of the configured iteration cap.
    Fast,
    /// Up to `max_iterations` rounds with early stop on convergence.
    Full,
}

/// One agent's successful answer within one round.
///
/// Immutable once created. Ordering within [`CollaborationResult`] is round
/// first, then invocation order within the round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Name of the responding agent.
    pub agent_name: String,
    /// Role the agent played.
    pub role: AgentRole,
    /// The agent's answer text.
    pub content: String,
    /// Model identifier reported by the agent's configuration.
    pub model_type: String,
    /// Zero-based round this response belongs to.
    pub round_index: u32,
    /// Wall-clock latency of the agent call in milliseconds.
    pub latency_ms: u64,
}

/// The aggregated outcome of one collaborative task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollaborationResult {
    /// The synthesized final answer.
    pub final_answer: String,
    /// Every successful agent response, ordered by round then invocation.
    pub agent_responses: Vec<AgentResponse>,
    /// One trace entry per significant orchestration step, including
    /// per-agent failures that were tolerated.
    pub collaboration_log: Vec<String>,
    /// Total wall-clock time of the collaboration in milliseconds.
    pub total_time_ms: u64,
    /// Confidence in the final answer, always within `[0, 1]`.
    pub confidence_score: f64,
    /// UTC timestamp of when the result was produced.
    pub produced_at: DateTime<Utc>,
}

impl CollaborationResult {
    /// Responses belonging to the given round, in invocation order.
    pub fn round_responses(&self, round_index: u32) -> Vec<&AgentResponse> {
        self.agent_responses
            .iter()
            .filter(|r| r.round_index == round_index)
            .collect()
    }

    /// The highest round index present, if any response exists.
    pub fn last_round_index(&self) -> Option<u32> {
        self.agent_responses.iter().map(|r| r.round_index).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(agent: &str, round: u32) -> AgentResponse {
        AgentResponse {
            agent_name: agent.to_string(),
            role: AgentRole::Proposer,
            content: "answer".to_string(),
            model_type: "test-model".to_string(),
            round_index: round,
            latency_ms: 5,
        }
    }

    #[test]
    fn test_agent_role_display() {
        assert_eq!(AgentRole::Proposer.to_string(), "proposer");
        assert_eq!(AgentRole::Synthesizer.to_string(), "synthesizer");
    }

    #[test]
    fn test_role_serialization_lowercase() {
        let json = serde_json::to_string(&AgentRole::Critic).unwrap();
        assert_eq!(json, "\"critic\"");
    }

    #[test]
    fn test_task_mode_serialization() {
        assert_eq!(serde_json::to_string(&TaskMode::Fast).unwrap(), "\"fast\"");
        assert_eq!(serde_json::to_string(&TaskMode::Full).unwrap(), "\"full\"");
    }

    #[test]
    fn test_round_responses_filtering() {
        let result = CollaborationResult {
            final_answer: "done".to_string(),
            agent_responses: vec![response("a", 0), response("b", 0), response("a", 1)],
            collaboration_log: vec![],
            total_time_ms: 10,
            confidence_score: 0.9,
            produced_at: Utc::now(),
        };
        assert_eq!(result.round_responses(0).len(), 2);
        assert_eq!(result.round_responses(1).len(), 1);
        assert_eq!(result.last_round_index(), Some(1));
    }

    #[test]
    fn test_collaboration_result_roundtrip() {
        let result = CollaborationResult {
            final_answer: "42".to_string(),
            agent_responses: vec![response("a", 0)],
            collaboration_log: vec!["round 0: querying 1 agents".to_string()],
            total_time_ms: 12,
            confidence_score: 0.75,
            produced_at: Utc::now(),
        };
        let json = serde_json::to_string(&result).unwrap();
        let parsed: CollaborationResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.final_answer, "42");
        assert_eq!(parsed.agent_responses.len(), 1);
    }

    #[test]
    fn test_invalid_transition_display() {
        let id = Uuid::new_v4();
        let err = RoundtableError::InvalidTransition {
            task_id: id,
            from: "completed".to_string(),
            to: "running".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("completed -> running"));
        assert!(msg.contains(&id.to_string()));
    }

    #[test]
    fn test_agent_timeout_display() {
        let err = RoundtableError::AgentTimeout {
            agent: "researcher-1".to_string(),
            elapsed_ms: 5000,
        };
        assert_eq!(
            err.to_string(),
            "agent 'researcher-1' timed out after 5000ms"
        );
    }
}
