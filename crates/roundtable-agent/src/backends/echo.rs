use super::AgentBackend;
use crate::config::AgentConfig;
use async_trait::async_trait;
use roundtable_core::RoundtableResult;

/// Deterministic in-process backend.
///
/// Produces the same output for the same (agent, prompt, context) input,
/// with no network access. Serves offline demos and keeps integration tests
/// free of hidden randomness.
pub struct EchoBackend {
    config: AgentConfig,
}

impl EchoBackend {
    /// Create an adapter for the given agent config.
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AgentBackend for EchoBackend {
    async fn is_available(&self) -> bool {
        true
    }

    async fn generate(&self, prompt: &str, context: &str) -> RoundtableResult<String> {
        let gist: String = prompt.split_whitespace().take(12).collect::<Vec<_>>().join(" ");
        if context.is_empty() {
            Ok(format!("[{} {}] {}", self.config.name, self.config.role, gist))
        } else {
            Ok(format!(
                "[{} {}] {} (context: {} chars)",
                self.config.name,
                self.config.role,
                gist,
                context.len()
            ))
        }
    }
}
