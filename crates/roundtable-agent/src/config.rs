use roundtable_core::AgentRole;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which backend adapter serves an agent.
///
/// Replaces runtime attribute probing with a tagged variant: the adapter is
/// chosen once, at registration, in [`crate::backends::backend_for`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Any OpenAI-compatible chat completions API (OpenAI, OpenRouter,
    /// Groq, Ollama, ...).
    OpenAi,
    /// The Anthropic messages API.
    Anthropic,
    /// Deterministic in-process backend, used for tests and offline demos.
    Echo,
}

/// Static configuration of one agent.
///
/// Created at registration and read-only afterwards. The registry is the
/// sole owner; callers only ever see clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Unique agent name within the registry.
    pub name: String,
    /// Backend adapter selection.
    pub backend: BackendKind,
    /// Role this agent plays in collaboration rounds.
    pub role: AgentRole,
    /// Capability tags advertised to callers (e.g. "code", "summarize").
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    /// Model identifier passed through to the backend and echoed in
    /// responses.
    pub model_type: String,
    /// Override for the backend's base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// API key, where the backend requires one.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Deadline for the availability probe in milliseconds.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
    /// Deadline for a single generation call in milliseconds, independent
    /// of any overall task deadline.
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

fn default_call_timeout_ms() -> u64 {
    60_000
}

impl AgentConfig {
    /// Create a config with defaults for the optional fields.
    pub fn new(
        name: impl Into<String>,
        backend: BackendKind,
        role: AgentRole,
        model_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            backend,
            role,
            capabilities: BTreeSet::new(),
            model_type: model_type.into(),
            api_base_url: None,
            api_key: None,
            probe_timeout_ms: default_probe_timeout_ms(),
            call_timeout_ms: default_call_timeout_ms(),
        }
    }

    /// Add capability tags.
    pub fn with_capabilities<I, S>(mut self, caps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.capabilities = caps.into_iter().map(Into::into).collect();
        self
    }

    /// Override the backend base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// The effective base URL for this agent's backend.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url
        } else {
            match self.backend {
                BackendKind::OpenAi => "https://api.openai.com",
                BackendKind::Anthropic => "https://api.anthropic.com",
                BackendKind::Echo => "local://echo",
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::new("critic-1", BackendKind::OpenAi, AgentRole::Critic, "gpt-4o");
        assert_eq!(config.probe_timeout_ms, 5_000);
        assert_eq!(config.call_timeout_ms, 60_000);
        assert!(config.capabilities.is_empty());
        assert_eq!(config.base_url(), "https://api.openai.com");
    }

    #[test]
    fn test_base_url_override() {
        let config =
            AgentConfig::new("local", BackendKind::OpenAi, AgentRole::Proposer, "llama3")
                .with_base_url("http://localhost:11434");
        assert_eq!(config.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_toml_deserialization_with_defaults() {
        let config: AgentConfig = serde_json::from_str(
            r#"{
                "name": "researcher-1",
                "backend": "anthropic",
                "role": "researcher",
                "model_type": "claude-sonnet-4"
            }"#,
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Anthropic);
        assert_eq!(config.base_url(), "https://api.anthropic.com");
        assert_eq!(config.probe_timeout_ms, 5_000);
    }

    #[test]
    fn test_capabilities_sorted_set() {
        let config = AgentConfig::new("p", BackendKind::Echo, AgentRole::Proposer, "echo")
            .with_capabilities(["search", "code", "code"]);
        assert_eq!(config.capabilities.len(), 2);
        assert!(config.capabilities.contains("search"));
    }
}
