//! Agent capability contract and backend adapters.
//!
//! Every AI worker that participates in a collaboration is represented by an
//! [`AgentConfig`] plus one [`AgentBackend`] adapter selected by
//! [`BackendKind`]. The adapter hides transport details behind two
//! operations: a bounded-latency availability probe that never fails, and a
//! generation call with a typed failure profile.
//!
//! # Main types
//!
//! - [`AgentBackend`] — The capability trait implemented per backend kind.
//! - [`BackendKind`] — Tagged selection of the concrete adapter.
//! - [`AgentConfig`] — Static, read-after-registration agent configuration.
//! - [`backend_for`] — Constructs the adapter matching a config.

/// Per-backend adapter implementations.
pub mod backends;
/// Agent configuration types.
pub mod config;

pub use backends::{backend_for, AgentBackend, AnthropicBackend, EchoBackend, OpenAiBackend};
pub use config::{AgentConfig, BackendKind};
