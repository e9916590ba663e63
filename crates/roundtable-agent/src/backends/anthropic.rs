use super::AgentBackend;
use crate::config::AgentConfig;
use async_trait::async_trait;
use roundtable_core::{RoundtableError, RoundtableResult};
use std::time::{Duration, Instant};
use tracing::debug;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic messages API backend.
pub struct AnthropicBackend {
    config: AgentConfig,
    http: reqwest::Client,
}

impl AnthropicBackend {
    /// Create an adapter for the given agent config.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn headers(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json");
        match &self.config.api_key {
            Some(key) => request.header("x-api-key", key),
            None => request,
        }
    }

    async fn messages(&self, prompt: &str, context: &str) -> RoundtableResult<String> {
        let url = format!("{}/v1/messages", self.config.base_url());

        let mut body = serde_json::json!({
            "model": self.config.model_type,
            "max_tokens": 4096,
            "messages": [{ "role": "user", "content": prompt }],
        });
        if !context.is_empty() {
            body["system"] = serde_json::json!(context);
        }

        let resp = self
            .headers(self.http.post(&url))
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

        // Text blocks only; tool-use blocks are not part of the contract.
        let text: String = resp_body["content"]
            .as_array()
            .map(|blocks| {
                blocks
                    .iter()
                    .filter(|b| b["type"] == "text")
                    .filter_map(|b| b["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(RoundtableError::AgentProtocol {
                agent: self.config.name.clone(),
                detail: format!("no text content in response: {resp_body}"),
            });
        }
        Ok(text)
    }
}

#[async_trait]
impl AgentBackend for AnthropicBackend {
    async fn is_available(&self) -> bool {
        let url = format!("{}/v1/models", self.config.base_url());
        let probe = self.headers(self.http.get(&url)).send();
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
        match tokio::time::timeout(deadline, self.messages(prompt, context)).await {
            Ok(result) => result,
            Err(_) => Err(RoundtableError::AgentTimeout {
                agent: self.config.name.clone(),
                elapsed_ms: start.elapsed().as_millis() as u64,
            }),
        }
    }
}
