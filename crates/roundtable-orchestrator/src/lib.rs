//! Multi-agent collaborative task orchestrator.
//!
//! Coordinates several independent AI worker agents to jointly produce one
//! answer to a submitted task. Each task runs one or more rounds; within a
//! round all participants are queried concurrently, across rounds execution
//! is sequential so each round can refine the previous round's synthesis.
//! Single-agent failures are tolerated and logged; a task only fails when
//! every agent in the final attempted round fails.
//!
//! # Main types
//!
//! - [`Orchestrator`] — Top-level facade: execute, stream, status, health,
//!   analytics, shutdown.
//! - [`AgentRegistry`] — Configured agents and their availability probes.
//! - [`TaskManager`] — Task records and the pending→running→terminal state
//!   machine.
//! - [`TaskEvent`] — Typed events for the streaming variant.
//! - [`HealthAggregator`] — Derives overall health from per-agent probes.
//! - [`AnalyticsCollector`] — Historical completed/failed and per-agent stats.

/// Historical task and per-agent statistics.
pub mod analytics;
/// Orchestration facade and the round-based collaboration loop.
pub mod engine;
/// Per-agent probing and overall health derivation.
pub mod health;
/// Agent roster and availability resolution.
pub mod registry;
/// Typed event stream for incremental consumption.
pub mod stream;
/// Pluggable confidence, convergence, and synthesis strategies.
pub mod strategy;
/// Task records and lifecycle state machine.
pub mod tasks;

pub use analytics::{AgentAnalyticsReport, AgentDetail, AgentStats, AnalyticsCollector};
pub use engine::{CollaborationRequest, Orchestrator};
pub use health::{AgentHealth, HealthAggregator, HealthReport, HealthStatus};
pub use registry::{AgentRegistry, Participant};
pub use stream::TaskEvent;
pub use strategy::{
    AgreementConvergence, ConfidenceStrategy, ConvergenceStrategy, SuccessWeightedConfidence,
    SynthesisStrategy, SynthesizerPreference,
};
pub use tasks::{Task, TaskManager, TaskStatus};
