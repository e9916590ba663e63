use futures::future;
use roundtable_agent::{backend_for, AgentBackend, AgentConfig};
use roundtable_core::AgentRole;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

struct RegisteredAgent {
    config: AgentConfig,
    backend: Arc<dyn AgentBackend>,
}

/// One resolved, available participant of a collaboration round.
#[derive(Clone)]
pub struct Participant {
    /// Agent name as registered.
    pub name: String,
    /// Role the agent plays in the round.
    pub role: AgentRole,
    /// Model identifier echoed into responses.
    pub model_type: String,
    /// The agent's backend adapter.
    pub backend: Arc<dyn AgentBackend>,
}

/// Holds configured agents and their availability probes.
///
/// Read-mostly: many concurrent task flows read the roster while
/// registration happens at startup. Configs are read-only after
/// registration; callers only ever receive clones.
#[derive(Default)]
pub struct AgentRegistry {
    agents: RwLock<HashMap<String, RegisteredAgent>>,
}

impl AgentRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent, constructing the backend adapter from its tagged
    /// kind. Re-registering a name replaces the previous entry.
    pub async fn register(&self, config: AgentConfig) {
        let backend = backend_for(&config);
        self.register_with_backend(config, backend).await;
    }

    /// Register an agent with an explicitly provided backend (used by tests
    /// and embedders with custom adapters).
    pub async fn register_with_backend(&self, config: AgentConfig, backend: Arc<dyn AgentBackend>) {
        info!(agent = %config.name, role = %config.role, "registering agent");
        let mut agents = self.agents.write().await;
        agents.insert(config.name.clone(), RegisteredAgent { config, backend });
    }

    /// All configured agents, sorted by name.
    pub async fn list_agents(&self) -> Vec<AgentConfig> {
        let agents = self.agents.read().await;
        let mut configs: Vec<AgentConfig> =
            agents.values().map(|a| a.config.clone()).collect();
        configs.sort_by(|a, b| a.name.cmp(&b.name));
        configs
    }

    /// The static capability set of one agent, if registered.
    pub async fn get_capabilities(&self, name: &str) -> Option<BTreeSet<String>> {
        let agents = self.agents.read().await;
        agents.get(name).map(|a| a.config.capabilities.clone())
    }

    /// Bounded-latency availability probe. Unknown names and probe failures
    /// are both `false`; this never propagates an error.
    pub async fn is_available(&self, name: &str) -> bool {
        let backend = {
            let agents = self.agents.read().await;
            agents.get(name).map(|a| Arc::clone(&a.backend))
        };
        match backend {
            Some(backend) => backend.is_available().await,
            None => false,
        }
    }

    /// Number of registered agents.
    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    /// Whether the registry has no agents.
    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// Names of all agents that currently pass their availability probe,
    /// sorted.
    pub async fn available_agents(&self) -> Vec<String> {
        let (participants, _) = self.resolve_participants(None).await;
        participants.into_iter().map(|p| p.name).collect()
    }

    /// Resolve the participant set for a task: the required names if given,
    /// otherwise the full roster, each filtered by a concurrent availability
    /// probe. Returns the available participants in request (or name) order,
    /// plus the names that were requested but not usable.
    pub async fn resolve_participants(
        &self,
        required: Option<&[String]>,
    ) -> (Vec<Participant>, Vec<String>) {
        let candidates: Vec<(String, Option<(AgentConfig, Arc<dyn AgentBackend>)>)> = {
            let agents = self.agents.read().await;
            let names: Vec<String> = match required {
                Some(names) => names.to_vec(),
                None => {
                    let mut all: Vec<String> = agents.keys().cloned().collect();
                    all.sort();
                    all
                }
            };
            names
                .into_iter()
                .map(|name| {
                    let entry = agents
                        .get(&name)
                        .map(|a| (a.config.clone(), Arc::clone(&a.backend)));
                    (name, entry)
                })
                .collect()
        };

        let probes = candidates.into_iter().map(|(name, entry)| async move {
            match entry {
                Some((config, backend)) => {
                    let available = backend.is_available().await;
                    (name, available.then_some((config, backend)))
                }
                None => (name, None),
            }
        });

        let mut participants = Vec::new();
        let mut unavailable = Vec::new();
        for (name, entry) in future::join_all(probes).await {
            match entry {
                Some((config, backend)) => participants.push(Participant {
                    name,
                    role: config.role,
                    model_type: config.model_type,
                    backend,
                }),
                None => unavailable.push(name),
            }
        }
        (participants, unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use roundtable_agent::BackendKind;
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

    fn config(name: &str, role: AgentRole) -> AgentConfig {
        AgentConfig::new(name, BackendKind::Echo, role, "stub-model")
    }

    async fn registry_with(agents: &[(&str, bool)]) -> AgentRegistry {
        let registry = AgentRegistry::new();
        for (name, available) in agents {
            registry
                .register_with_backend(
                    config(name, AgentRole::Proposer),
                    Arc::new(StubBackend {
                        available: *available,
                    }),
                )
                .await;
        }
        registry
    }

    #[tokio::test]
    async fn test_list_agents_sorted() {
        let registry = registry_with(&[("beta", true), ("alpha", true)]).await;
        let names: Vec<String> = registry
            .list_agents()
            .await
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[tokio::test]
    async fn test_is_available_unknown_is_false() {
        let registry = registry_with(&[("a", true)]).await;
        assert!(registry.is_available("a").await);
        assert!(!registry.is_available("ghost").await);
    }

    #[tokio::test]
    async fn test_capabilities_lookup() {
        let registry = AgentRegistry::new();
        registry
            .register_with_backend(
                config("a", AgentRole::Researcher).with_capabilities(["search"]),
                Arc::new(StubBackend { available: true }),
            )
            .await;
        let caps = registry.get_capabilities("a").await.unwrap();
        assert!(caps.contains("search"));
        assert!(registry.get_capabilities("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_all_filters_unavailable() {
        let registry = registry_with(&[("a", true), ("b", false), ("c", true)]).await;
        let (participants, unavailable) = registry.resolve_participants(None).await;
        let names: Vec<&str> = participants.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
        assert_eq!(unavailable, vec!["b"]);
    }

    #[tokio::test]
    async fn test_resolve_required_preserves_request_order() {
        let registry = registry_with(&[("a", true), ("b", true)]).await;
        let required = vec!["b".to_string(), "a".to_string(), "ghost".to_string()];
        let (participants, unavailable) = registry.resolve_participants(Some(&required)).await;
        let names: Vec<&str> = participants.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(unavailable, vec!["ghost"]);
    }

    #[tokio::test]
    async fn test_available_agents_listing() {
        let registry = registry_with(&[("b", true), ("a", true), ("c", false)]).await;
        assert_eq!(registry.available_agents().await, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_reregister_replaces() {
        let registry = registry_with(&[("a", false)]).await;
        assert!(!registry.is_available("a").await);
        registry
            .register_with_backend(
                config("a", AgentRole::Proposer),
                Arc::new(StubBackend { available: true }),
            )
            .await;
        assert!(registry.is_available("a").await);
        assert_eq!(registry.len().await, 1);
    }
}
