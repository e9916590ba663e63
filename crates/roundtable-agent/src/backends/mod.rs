/// Anthropic messages API adapter.
pub mod anthropic;
/// Deterministic in-process adapter.
pub mod echo;
/// OpenAI-compatible chat completions adapter.
pub mod openai;

pub use anthropic::AnthropicBackend;
pub use echo::EchoBackend;
pub use openai::OpenAiBackend;

use crate::config::{AgentConfig, BackendKind};
use async_trait::async_trait;
use roundtable_core::RoundtableResult;
use std::sync::Arc;

/// The capability contract every agent backend implements.
///
/// To add a new backend kind:
/// 1. Create a new module in `backends/`
/// 2. Implement `AgentBackend` for your struct
/// 3. Add the variant to `BackendKind` in `config.rs`
/// 4. Wire it up in `backend_for()`
#[async_trait]
pub trait AgentBackend: Send + Sync {
    /// Bounded-latency reachability probe. Never errors: any transport
    /// failure or timeout is reported as `false`.
    async fn is_available(&self) -> bool;

    /// Run one generation call. Fails only with `AgentUnavailable`,
    /// `AgentTimeout`, or `AgentProtocol`; the call is bounded by the
    /// agent's `call_timeout_ms`, independent of the overall task deadline.
    async fn generate(&self, prompt: &str, context: &str) -> RoundtableResult<String>;
}

/// Construct the backend adapter matching the config's tagged kind.
pub fn backend_for(config: &AgentConfig) -> Arc<dyn AgentBackend> {
    match config.backend {
        BackendKind::OpenAi => Arc::new(OpenAiBackend::new(config.clone())),
        BackendKind::Anthropic => Arc::new(AnthropicBackend::new(config.clone())),
        BackendKind::Echo => Arc::new(EchoBackend::new(config.clone())),
    }
}
