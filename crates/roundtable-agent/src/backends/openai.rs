use super::AgentBackend;
use crate::config::AgentConfig;
use async_trait::async_trait;
use roundtable_core::{RoundtableError, RoundtableResult};
use std::time::{Duration, Instant};
use tracing::debug;

/// OpenAI-compatible chat completions backend.
///
/// Works with OpenAI, OpenRouter, Groq, Ollama, and any other provider that
/// implements the chat completions API.
pub struct OpenAiBackend {
    config: AgentConfig,
    http: reqwest::Client,
}

impl OpenAiBackend {
    /// Create an adapter for the given agent config.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("Authorization", format!("Bearer {key}")),
            None => request,
        }
    }

    async fn chat(&self, prompt: &str, context: &str) -> RoundtableResult<String> {
        let url = format!("{}/v1/chat/completions", self.config.base_url());

        let mut messages: Vec<serde_json::Value> = Vec::new();
        if !context.is_empty() {
            messages.push(serde_json::json!({ "role": "system", "content": context }));
        }
        messages.push(serde_json::json!({ "role": "user", "content": prompt }));

        let body = serde_json::json!({
            "model": self.config.model_type,
            "messages": messages,
        });

        let resp = self
            .auth(self.http.post(&url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    RoundtableError::AgentUnavailable {
                        agent: self.config.name.clone(),
                        reason: e.to_string(),
                    }
                } else {
                    RoundtableError::AgentProtocol {
                        agent: self.config.name.clone(),
                        detail: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        let resp_body: serde_json::Value =
            resp.json()
                .await
                .map_err(|e| RoundtableError::AgentProtocol {
                    agent: self.config.name.clone(),
                    detail: e.to_string(),
                })?;

        if !status.is_success() {
            return Err(RoundtableError::AgentProtocol {
                agent: self.config.name.clone(),
                detail: format!("API error {status}: {resp_body}"),
            });
        }

        resp_body["choices"][0]["message"]["content"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| RoundtableError::AgentProtocol {
                agent: self.config.name.clone(),
                detail: format!("no message content in response: {resp_body}"),
            })
    }
}

#[async_trait]
impl AgentBackend for OpenAiBackend {
    async fn is_available(&self) -> bool {
        let url = format!("{}/v1/models", self.config.base_url());
        let probe = self.auth(self.http.get(&url)).send();
        match tokio::time::timeout(Duration::from_millis(self.config.probe_timeout_ms), probe)
            .await
        {
            Ok(Ok(resp)) => resp.status().is_success(),
            Ok(Err(e)) => {
                debug!(agent = %self.config.name, error = %e, "availability probe failed");
                false
            }
            Err(_) => {
                debug!(agent = %self.config.name, "availability probe timed out");
                false
            }
        }
    }

    async fn generate(&self, prompt: &str, context: &str) -> RoundtableResult<String> {
        let start = Instant::now();
        let deadline = Duration::from_millis(self.config.call_timeout_ms);
        match tokio::time::timeout(deadline, self.chat(prompt, context)).await {
            Ok(result) => result,
            Err(_) => Err(RoundtableError::AgentTimeout {
                agent: self.config.name.clone(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }
}
