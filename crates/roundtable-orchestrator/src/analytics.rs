use roundtable_core::AgentRole;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// Historical per-agent statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentStats {
    /// Successful generation calls.
    pub invocations: u64,
    /// Failed generation calls (timeout, protocol, unavailable).
    pub failures: u64,
    /// Sum of successful-call latencies in milliseconds.
    pub total_latency_ms: u64,
}

impl AgentStats {
    /// Mean latency of successful calls, zero when there were none.
    pub fn average_latency_ms(&self) -> u64 {
        if self.invocations == 0 {
            0
        } else {
            self.total_latency_ms / self.invocations
        }
    }
}

/// Per-agent entry of an analytics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDetail {
    /// Agent name.
    pub name: String,
    /// Configured role.
    pub role: AgentRole,
    /// Configured model identifier.
    pub model_type: String,
    /// Capability tags.
    pub capabilities: Vec<String>,
    /// Successful generation calls.
    pub invocations: u64,
    /// Failed generation calls.
    pub failures: u64,
    /// Mean successful-call latency in milliseconds.
    pub average_latency_ms: u64,
}

/// Aggregate analytics over tasks and agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentAnalyticsReport {
    /// Number of registered agents.
    pub total_agents: usize,
    /// Agents last observed available (no fresh probe is performed).
    pub available_agents: usize,
    /// Per-agent details, sorted by name.
    pub agent_details: Vec<AgentDetail>,
    /// Tasks that reached `Completed`.
    pub total_completed: u64,
    /// Tasks that reached `Failed`.
    pub total_failed: u64,
}

/// Aggregates historical completed/failed counts and per-agent stats.
///
/// The two task counters are atomics so simultaneously completing tasks
/// never lose updates. Reads are cheap and never perform network probes;
/// `available_agents` reflects the most recent health check or participant
/// resolution.
#[derive(Default)]
pub struct AnalyticsCollector {
    completed: AtomicU64,
    failed: AtomicU64,
    available_agents: AtomicUsize,
    per_agent: RwLock<HashMap<String, AgentStats>>,
}

impl AnalyticsCollector {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one completed task.
    pub fn record_task_completed(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one failed task.
    pub fn record_task_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful agent call and its latency.
    pub async fn record_agent_success(&self, agent: &str, latency_ms: u64) {
        let mut per_agent = self.per_agent.write().await;
        let stats = per_agent.entry(agent.to_string()).or_default();
        stats.invocations += 1;
        stats.total_latency_ms += latency_ms;
    }

    /// Record a failed agent call.
    pub async fn record_agent_failure(&self, agent: &str) {
        let mut per_agent = self.per_agent.write().await;
        per_agent.entry(agent.to_string()).or_default().failures += 1;
    }

    /// Update the last-observed available agent count.
    pub fn note_available_agents(&self, count: usize) {
        self.available_agents.store(count, Ordering::Relaxed);
    }

    /// `(completed, failed)` task totals.
    pub fn task_totals(&self) -> (u64, u64) {
        (
            self.completed.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }

    /// Agents last observed available.
    pub fn available_agents(&self) -> usize {
        self.available_agents.load(Ordering::Relaxed)
    }

    /// Snapshot of the per-agent stats map.
    pub async fn agent_stats(&self) -> HashMap<String, AgentStats> {
        self.per_agent.read().await.clone()
    }
}
