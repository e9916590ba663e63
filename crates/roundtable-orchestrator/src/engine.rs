use crate::analytics::{AgentAnalyticsReport, AgentDetail, AnalyticsCollector};
use crate::health::{HealthAggregator, HealthReport};
use crate::registry::AgentRegistry;
use crate::strategy::{
    AgreementConvergence, ConfidenceStrategy, ConvergenceStrategy, SuccessWeightedConfidence,
    SynthesisStrategy, SynthesizerPreference,
};
use crate::stream::TaskEvent;
use crate::tasks::{Task, TaskManager};
use chrono::Utc;
use futures::future;
use roundtable_core::{
    AgentResponse, CollaborationResult, RoundtableError, RoundtableResult, TaskMode,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Parameters of one collaborative task submission.
#[derive(Debug, Clone)]
pub struct CollaborationRequest {
    /// The question or task the agents jointly answer.
    pub prompt: String,
    /// Context passed to every agent call (system context).
    pub context: String,
    /// Restrict participation to these agents; `None` uses the full roster.
    pub required_agents: Option<Vec<String>>,
    /// Upper bound on refinement rounds (ignored in fast mode, min 1).
    pub max_iterations: u32,
    /// Broader project background folded into the round prompt.
    pub project_context: String,
    /// Run exactly one round, skipping refinement.
    pub fast_mode: bool,
}

impl CollaborationRequest {
    /// A full-mode request with three iterations and no extra context.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            context: String::new(),
            required_agents: None,
            max_iterations: 3,
            project_context: String::new(),
            fast_mode: false,
        }
    }

    /// Set the per-call system context.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the project background.
    pub fn with_project_context(mut self, project_context: impl Into<String>) -> Self {
        self.project_context = project_context.into();
        self
    }

    /// Restrict the participant set.
    pub fn with_required_agents<I, S>(mut self, agents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_agents = Some(agents.into_iter().map(Into::into).collect());
        self
    }

    /// Set the round cap.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Switch to single-round fast mode.
    pub fn fast(mut self) -> Self {
        self.fast_mode = true;
        self
    }

    fn mode(&self) -> TaskMode {
        if self.fast_mode {
            TaskMode::Fast
        } else {
            TaskMode::Full
        }
    }
}

struct AgentFailure {
    agent: String,
    message: String,
}

/// The multi-agent collaboration orchestrator.
///
/// Explicitly constructed and owner-controlled: no global instance. Within a
/// task, each round fans out to all participants concurrently and joins
/// before the next round; rounds are sequential so round *k+1* can refine a
/// synthesis of round *k*. [`Orchestrator::shutdown`] drains in-flight
/// streaming tasks before cancelling the rest.
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    tasks: Arc<TaskManager>,
    analytics: Arc<AnalyticsCollector>,
    health: HealthAggregator,
    confidence: Arc<dyn ConfidenceStrategy>,
    convergence: Arc<dyn ConvergenceStrategy>,
    synthesis: Arc<dyn SynthesisStrategy>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Orchestrator {
    /// Create an orchestrator over the given registry with the default
    /// strategies.
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            health: HealthAggregator::new(Arc::clone(&registry)),
            registry,
            tasks: Arc::new(TaskManager::new()),
            analytics: Arc::new(AnalyticsCollector::new()),
            confidence: Arc::new(SuccessWeightedConfidence),
            convergence: Arc::new(AgreementConvergence::default()),
            synthesis: Arc::new(SynthesizerPreference),
            cancel: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Replace the confidence strategy.
    pub fn with_confidence(mut self, strategy: impl ConfidenceStrategy + 'static) -> Self {
        self.confidence = Arc::new(strategy);
        self
    }

    /// Replace the convergence strategy.
    pub fn with_convergence(mut self, strategy: impl ConvergenceStrategy + 'static) -> Self {
        self.convergence = Arc::new(strategy);
        self
    }

    /// Replace the synthesis strategy.
    pub fn with_synthesis(mut self, strategy: impl SynthesisStrategy + 'static) -> Self {
        self.synthesis = Arc::new(strategy);
        self
    }

    /// The agent registry this orchestrator coordinates.
    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    /// The analytics collector.
    pub fn analytics(&self) -> &Arc<AnalyticsCollector> {
        &self.analytics
    }

    /// Run a collaborative task to completion and return its result.
    pub async fn execute_collaborative_task(
        &self,
        request: CollaborationRequest,
    ) -> RoundtableResult<CollaborationResult> {
        let (_, result) = self.execute_tracked(request).await?;
        Ok(result)
    }

    /// Like [`Self::execute_collaborative_task`], but also returns the task
    /// id so the caller can correlate status queries.
    pub async fn execute_tracked(
        &self,
        request: CollaborationRequest,
    ) -> RoundtableResult<(Uuid, CollaborationResult)> {
        if self.cancel.is_cancelled() {
            return Err(RoundtableError::Orchestration(
                "orchestrator is shut down".to_string(),
            ));
        }
        let task_id = self
            .tasks
            .create_task(&request.prompt, &request.context, request.mode())
            .await;
        let cancel = self.cancel.child_token();
        let result = self.run_and_record(task_id, &request, None, &cancel).await?;
        Ok((task_id, result))
    }

    /// Run a collaborative task as a finite event stream.
    ///
    /// Returns the task id and the event receiver. Dropping the receiver
    /// cancels the producer, including in-flight agent calls, and the task
    /// ends `Failed` with a cancellation error rather than staying
    /// `Running`.
    pub async fn stream_collaborative_task(
        self: &Arc<Self>,
        request: CollaborationRequest,
    ) -> RoundtableResult<(Uuid, mpsc::Receiver<TaskEvent>)> {
        if self.cancel.is_cancelled() {
            return Err(RoundtableError::Orchestration(
                "orchestrator is shut down".to_string(),
            ));
        }
        let task_id = self
            .tasks
            .create_task(&request.prompt, &request.context, request.mode())
            .await;
        let (tx, rx) = mpsc::channel(32);
        let cancel = self.cancel.child_token();
        let this = Arc::clone(self);

        self.tracker.spawn(async move {
            if tx
                .send(TaskEvent::started(task_id, &request.prompt))
                .await
                .is_err()
            {
                // Consumer gone before the first event; never poll agents.
                this.abandon(task_id).await;
                return;
            }

            // A dropped receiver must stop in-flight agent calls.
            let watch_tx = tx.clone();
            let watch_cancel = cancel.clone();
            let watcher = tokio::spawn(async move {
                watch_tx.closed().await;
                watch_cancel.cancel();
            });

            let outcome = this
                .run_and_record(task_id, &request, Some(&tx), &cancel)
                .await;
            watcher.abort();

            let terminal = match outcome {
                Ok(result) => TaskEvent::completed(task_id, result),
                Err(e) => TaskEvent::failed(task_id, e.to_string()),
            };
            let _ = tx.send(terminal).await;
        });

        Ok((task_id, rx))
    }

    /// Snapshot of one task, or `TaskNotFound`.
    pub async fn get_task_status(&self, task_id: Uuid) -> RoundtableResult<Task> {
        self.tasks.get_status(task_id).await
    }

    /// Snapshots of all non-terminal tasks.
    pub async fn get_active_tasks(&self) -> Vec<Task> {
        self.tasks.list_active().await
    }

    /// Probe all agents and derive overall health.
    pub async fn health_check(&self) -> HealthReport {
        let active = self.tasks.active_count().await;
        let report = self.health.health_check(active).await;
        self.analytics
            .note_available_agents(report.agents.iter().filter(|a| a.healthy).count());
        report
    }

    /// Aggregate analytics from previously recorded state. Performs no
    /// network probes; `available_agents` is the last observed count.
    pub async fn get_agent_analytics(&self) -> AgentAnalyticsReport {
        let configs = self.registry.list_agents().await;
        let stats = self.analytics.agent_stats().await;
        let (total_completed, total_failed) = self.analytics.task_totals();

        let agent_details = configs
            .into_iter()
            .map(|config| {
                let agent_stats = stats.get(&config.name).cloned().unwrap_or_default();
                AgentDetail {
                    average_latency_ms: agent_stats.average_latency_ms(),
                    name: config.name,
                    role: config.role,
                    model_type: config.model_type,
                    capabilities: config.capabilities.into_iter().collect(),
                    invocations: agent_stats.invocations,
                    failures: agent_stats.failures,
                }
            })
            .collect::<Vec<_>>();

        AgentAnalyticsReport {
            total_agents: agent_details.len(),
            available_agents: self.analytics.available_agents(),
            agent_details,
            total_completed,
            total_failed,
        }
    }

    /// Shut down: stop accepting tasks, let in-flight streaming tasks drain
    /// within the window, then cancel the rest and wait for them to settle.
    pub async fn shutdown(&self, drain: Duration) {
        info!("orchestrator shutting down");
        self.tracker.close();
        if tokio::time::timeout(drain, self.tracker.wait()).await.is_err() {
            warn!("drain window elapsed, cancelling in-flight tasks");
            self.cancel.cancel();
            self.tracker.wait().await;
        } else {
            self.cancel.cancel();
        }
    }

    /// Mark a task cancelled before it ever ran a round.
    async fn abandon(&self, task_id: Uuid) {
        if let Err(e) = self.tasks.mark_running(task_id).await {
            error!(task_id = %task_id, error = %e, "abandon: invalid transition");
            return;
        }
        if let Err(e) = self
            .tasks
            .mark_failed(task_id, RoundtableError::Cancelled.to_string())
            .await
        {
            error!(task_id = %task_id, error = %e, "abandon: invalid transition");
            return;
        }
        self.analytics.record_task_failed();
    }

    /// Drive one task through the round loop and record the outcome in the
    /// task manager and analytics. The round loop itself is side-effect
    /// free; all bookkeeping happens here.
    async fn run_and_record(
        &self,
        task_id: Uuid,
        request: &CollaborationRequest,
        events: Option<&mpsc::Sender<TaskEvent>>,
        cancel: &CancellationToken,
    ) -> RoundtableResult<CollaborationResult> {
        self.tasks.mark_running(task_id).await?;
        info!(task_id = %task_id, fast_mode = request.fast_mode, "task started");

        let (outcome, failures) = self.run_rounds(task_id, request, events, cancel).await;
        for failure in &failures {
            self.analytics.record_agent_failure(&failure.agent).await;
        }

        match outcome {
            Ok(result) => {
                for response in &result.agent_responses {
                    self.analytics
                        .record_agent_success(&response.agent_name, response.latency_ms)
                        .await;
                }
                self.tasks.mark_completed(task_id, result.clone()).await?;
                self.analytics.record_task_completed();
                info!(
                    task_id = %task_id,
                    responses = result.agent_responses.len(),
                    confidence = result.confidence_score,
                    total_time_ms = result.total_time_ms,
                    "task completed"
                );
                Ok(result)
            }
            Err(e) => {
                self.tasks.mark_failed(task_id, e.to_string()).await?;
                self.analytics.record_task_failed();
                warn!(task_id = %task_id, error = %e, "task failed");
                Err(e)
            }
        }
    }

    /// The collaboration loop. Returns the result (or the aggregated error)
    /// plus every tolerated per-agent failure; mutates nothing outside its
    /// return value.
    async fn run_rounds(
        &self,
        task_id: Uuid,
        request: &CollaborationRequest,
        events: Option<&mpsc::Sender<TaskEvent>>,
        cancel: &CancellationToken,
    ) -> (RoundtableResult<CollaborationResult>, Vec<AgentFailure>) {
        let start = Instant::now();
        let mut log: Vec<String> = Vec::new();
        let mut failures: Vec<AgentFailure> = Vec::new();

        let (participants, unavailable) = self
            .registry
            .resolve_participants(request.required_agents.as_deref())
            .await;
        // Confidence is scored against everyone who was asked for, so a
        // requested agent that never participates still lowers the score.
        let requested = participants.len() + unavailable.len();
        for name in &unavailable {
            log.push(format!("agent {name} excluded: unavailable"));
        }
        if participants.is_empty() {
            return (
                Err(RoundtableError::Orchestration(
                    "no agents available for task".to_string(),
                )),
                failures,
            );
        }
        self.analytics.note_available_agents(participants.len());
        log.push(format!(
            "resolved {} participants: {}",
            participants.len(),
            participants
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));

        let rounds = if request.fast_mode {
            1
        } else {
            request.max_iterations.max(1)
        };
        let mut all_responses: Vec<AgentResponse> = Vec::new();
        let mut last_round: Vec<AgentResponse> = Vec::new();
        let mut current_prompt = compose_prompt(request);

        for round_index in 0..rounds {
            log.push(format!(
                "round {round_index}: querying {} agents",
                participants.len()
            ));

            let calls = participants.iter().map(|p| {
                let prompt = current_prompt.clone();
                async move {
                    let call_start = Instant::now();
                    let outcome = p.backend.generate(&prompt, &request.context).await;
                    (p, call_start.elapsed(), outcome)
                }
            });
            // join_all preserves invocation order, so within-round response
            // order is stable and reproducible.
            let joined = tokio::select! {
                joined = future::join_all(calls) => joined,
                _ = cancel.cancelled() => {
                    log.push(format!("round {round_index}: cancelled"));
                    return (Err(RoundtableError::Cancelled), failures);
                }
            };

            let mut round_responses: Vec<AgentResponse> = Vec::new();
            for (participant, latency, outcome) in joined {
                match outcome {
                    Ok(content) => {
                        let response = AgentResponse {
                            agent_name: participant.name.clone(),
                            role: participant.role,
                            content,
                            model_type: participant.model_type.clone(),
                            round_index,
                            latency_ms: latency.as_millis() as u64,
                        };
                        log.push(format!(
                            "round {round_index}: agent {} responded in {}ms",
                            participant.name, response.latency_ms
                        ));
                        if let Some(tx) = events {
                            if tx
                                .send(TaskEvent::agent_response(task_id, response.clone()))
                                .await
                                .is_err()
                            {
                                return (Err(RoundtableError::Cancelled), failures);
                            }
                        }
                        round_responses.push(response);
                    }
                    Err(e) => {
                        warn!(
                            task_id = %task_id,
                            agent = %participant.name,
                            round = round_index,
                            error = %e,
                            "agent call failed"
                        );
                        log.push(format!(
                            "round {round_index}: agent {} failed: {e}",
                            participant.name
                        ));
                        failures.push(AgentFailure {
                            agent: participant.name.clone(),
                            message: e.to_string(),
                        });
                    }
                }
            }

            if round_responses.is_empty() {
                let detail = failures
                    .iter()
                    .map(|f| format!("{}: {}", f.agent, f.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                return (
                    Err(RoundtableError::Orchestration(format!(
                        "round {round_index}: all {} agents failed ({detail})",
                        participants.len()
                    ))),
                    failures,
                );
            }

            all_responses.extend(round_responses.iter().cloned());
            last_round = round_responses;

            let is_last = round_index + 1 == rounds;
            if !is_last {
                if self.convergence.converged(&last_round) {
                    log.push(format!(
                        "round {round_index}: responses converged, stopping early"
                    ));
                    break;
                }
                let synthesis = self.synthesis.synthesize(&last_round).unwrap_or_default();
                current_prompt = compose_refinement(request, &synthesis);
                log.push(format!("round {round_index}: synthesized refinement prompt"));
            }
        }

        let final_answer = match self.synthesis.synthesize(&last_round) {
            Some(answer) => answer,
            None => {
                return (
                    Err(RoundtableError::Orchestration(
                        "synthesis produced no answer".to_string(),
                    )),
                    failures,
                );
            }
        };
        let confidence = self
            .confidence
            .score(requested, &last_round)
            .clamp(0.0, 1.0);
        log.push(format!("final answer selected, confidence {confidence:.2}"));

        let result = CollaborationResult {
            final_answer,
            agent_responses: all_responses,
            collaboration_log: log,
            total_time_ms: start.elapsed().as_millis() as u64,
            confidence_score: confidence,
            produced_at: Utc::now(),
        };
        (Ok(result), failures)
    }
}

fn compose_prompt(request: &CollaborationRequest) -> String {
    if request.project_context.is_empty() {
        request.prompt.clone()
    } else {
        format!(
            "Project context:\n{}\n\nTask:\n{}",
            request.project_context, request.prompt
        )
    }
}

fn compose_refinement(request: &CollaborationRequest, synthesis: &str) -> String {
    format!(
        "{}\n\nSynthesis of the previous round:\n{synthesis}\n\nRefine your answer.",
        compose_prompt(request)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = CollaborationRequest::new("question");
        assert_eq!(request.max_iterations, 3);
        assert!(!request.fast_mode);
        assert!(request.required_agents.is_none());
        assert_eq!(request.mode(), TaskMode::Full);
        assert_eq!(CollaborationRequest::new("q").fast().mode(), TaskMode::Fast);
    }

    #[test]
    fn test_compose_prompt_without_project_context() {
        let request = CollaborationRequest::new("question");
        assert_eq!(compose_prompt(&request), "question");
    }

    #[test]
    fn test_compose_prompt_with_project_context() {
        let request = CollaborationRequest::new("question").with_project_context("a rust service");
        let prompt = compose_prompt(&request);
        assert!(prompt.contains("a rust service"));
        assert!(prompt.contains("question"));
    }

    #[test]
    fn test_compose_refinement_carries_synthesis() {
        let request = CollaborationRequest::new("question");
        let prompt = compose_refinement(&request, "round one consensus");
        assert!(prompt.contains("question"));
        assert!(prompt.contains("round one consensus"));
        assert!(prompt.contains("Refine"));
    }
}
