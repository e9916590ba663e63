use crate::registry::AgentRegistry;
use chrono::{DateTime, Utc};
use futures::future;
use roundtable_core::AgentRole;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Overall system health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Every probed agent is healthy.
    Healthy,
    /// Some, but not all, probed agents are healthy.
    Degraded,
    /// No probed agent is healthy (including an empty roster).
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Probe outcome for a single agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    /// Agent name.
    pub name: String,
    /// Configured role.
    pub role: AgentRole,
    /// Whether the probe succeeded within its deadline.
    pub healthy: bool,
    /// Probe failure detail; probes never propagate errors.
    pub error: Option<String>,
}

/// Aggregated health report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Derived overall status.
    pub status: HealthStatus,
    /// Per-agent probe outcomes, in roster order.
    pub agents: Vec<AgentHealth>,
    /// Non-terminal tasks at probe time.
    pub active_task_count: usize,
    /// When the probes ran.
    pub checked_at: DateTime<Utc>,
}

/// Derives overall system health from per-agent probes.
pub struct HealthAggregator {
    registry: Arc<AgentRegistry>,
}

impl HealthAggregator {
    /// Create an aggregator over the given registry.
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self { registry }
    }

    /// Probe every registered agent concurrently and derive the overall
    /// status. Individual probe failures are recorded as error strings and
    /// never propagated.
    pub async fn health_check(&self, active_task_count: usize) -> HealthReport {
        let configs = self.registry.list_agents().await;
        let probes = configs.into_iter().map(|config| async move {
            let healthy = self.registry.is_available(&config.name).await;
            AgentHealth {
                error: (!healthy).then(|| {
                    format!(
                        "agent did not respond healthy within {}ms",
                        config.probe_timeout_ms
                    )
                }),
                name: config.name,
                role: config.role,
                healthy,
            }
        });
        let agents: Vec<AgentHealth> = future::join_all(probes).await;

        let healthy_count = agents.iter().filter(|a| a.healthy).count();
        let status = if healthy_count == 0 {
            HealthStatus::Unhealthy
        } else if healthy_count == agents.len() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthReport {
            status,
            agents,
            active_task_count,
            checked_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use roundtable_agent::{AgentBackend, AgentConfig, BackendKind};
    use roundtable_core::RoundtableResult;

    struct StubBackend {
        available: bool,
    }

    #[async_trait]
    impl AgentBackend for StubBackend {
        async fn is_available(&self) -> bool {
            self.available
        }

        async fn generate(&self, _prompt: &str, _context: &str) -> RoundtableResult<String> {
            Ok("stub".to_string())
        }
    }

    async fn aggregator_with(agents: &[(&str, bool)]) -> HealthAggregator {
        let registry = Arc::new(AgentRegistry::new());
        for (name, available) in agents {
            registry
                .register_with_backend(
                    AgentConfig::new(*name, BackendKind::Echo, AgentRole::Proposer, "m"),
                    Arc::new(StubBackend {
                        available: *available,
                    }),
                )
                .await;
        }
        HealthAggregator::new(registry)
    }

    #[tokio::test]
    async fn test_all_healthy() {
        let aggregator = aggregator_with(&[("a", true), ("b", true)]).await;
        let report = aggregator.health_check(2).await;
        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.active_task_count, 2);
        assert!(report.agents.iter().all(|a| a.error.is_none()));
    }

    #[tokio::test]
    async fn test_degraded_with_error_string() {
        let aggregator = aggregator_with(&[("a", true), ("b", false)]).await;
        let report = aggregator.health_check(0).await;
        assert_eq!(report.status, HealthStatus::Degraded);
        let down = report.agents.iter().find(|a| a.name == "b").unwrap();
        assert!(!down.healthy);
        assert!(down.error.as_deref().unwrap().contains("did not respond"));
    }

    #[tokio::test]
    async fn test_unhealthy_when_none_reachable() {
        let aggregator = aggregator_with(&[("a", false), ("b", false)]).await;
        let report = aggregator.health_check(0).await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_empty_roster_is_unhealthy() {
        let aggregator = aggregator_with(&[]).await;
        let report = aggregator.health_check(0).await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.agents.is_empty());
    }
}
