//! Pluggable scoring, convergence, and synthesis strategies.
//!
//! The collaboration loop treats all three as trait objects so embedders can
//! swap in domain-specific logic. The defaults are deterministic and use
//! token-set (Jaccard) overlap as the agreement measure; no strategy may
//! introduce hidden randomness, since identical inputs must yield identical
//! final answers.

use roundtable_core::{AgentResponse, AgentRole};
use std::collections::BTreeSet;

/// Computes the confidence score for a finished collaboration.
///
/// Implementations must return a value in `[0, 1]` that is monotonically
/// non-decreasing in both the fraction of requested agents that responded
/// and the agreement across those responses.
pub trait ConfidenceStrategy: Send + Sync {
    /// Score the final round. `requested` is the size of the requested
    /// roster, including agents that were excluded as unavailable;
    /// `final_round` holds the successful responses.
    fn score(&self, requested: usize, final_round: &[AgentResponse]) -> f64;
}

/// Decides whether a round's responses have converged, allowing the loop to
/// stop before `max_iterations`.
pub trait ConvergenceStrategy: Send + Sync {
    /// `round` holds the successful responses of the round just finished.
    fn converged(&self, round: &[AgentResponse]) -> bool;
}

/// Produces the final answer from the last round's successful responses.
///
/// Must be deterministic: identical responses yield an identical answer.
pub trait SynthesisStrategy: Send + Sync {
    /// Returns `None` only when `final_round` is empty.
    fn synthesize(&self, final_round: &[AgentResponse]) -> Option<String>;
}

fn token_set(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    intersection / union
}

/// Mean pairwise Jaccard similarity across response contents.
///
/// A single response agrees perfectly with itself (1.0); an empty slice has
/// no agreement (0.0).
pub fn mean_pairwise_agreement(responses: &[AgentResponse]) -> f64 {
    match responses.len() {
        0 => 0.0,
        1 => 1.0,
        n => {
            let sets: Vec<BTreeSet<String>> =
                responses.iter().map(|r| token_set(&r.content)).collect();
            let mut total = 0.0;
            let mut pairs = 0u32;
            for i in 0..n {
                for j in (i + 1)..n {
                    total += jaccard(&sets[i], &sets[j]);
                    pairs += 1;
                }
            }
            total / f64::from(pairs)
        }
    }
}

/// Default confidence: response fraction weighted by agreement.
///
/// `score = success_fraction * (0.5 + 0.5 * mean_pairwise_agreement)`,
/// clamped to `[0, 1]`. Monotone in both inputs; a full-roster, unanimous
/// round scores 1.0.
#[derive(Debug, Default, Clone, Copy)]
pub struct SuccessWeightedConfidence;

impl ConfidenceStrategy for SuccessWeightedConfidence {
    fn score(&self, requested: usize, final_round: &[AgentResponse]) -> f64 {
        if requested == 0 || final_round.is_empty() {
            return 0.0;
        }
        let fraction = (final_round.len() as f64 / requested as f64).min(1.0);
        let agreement = mean_pairwise_agreement(final_round);
        (fraction * (0.5 + 0.5 * agreement)).clamp(0.0, 1.0)
    }
}

/// Default convergence: stop early once the round's mean pairwise agreement
/// reaches the threshold.
#[derive(Debug, Clone, Copy)]
pub struct AgreementConvergence {
    threshold: f64,
}

impl AgreementConvergence {
    /// Create with an explicit agreement threshold in `[0, 1]`.
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.clamp(0.0, 1.0),
        }
    }
}

impl Default for AgreementConvergence {
    fn default() -> Self {
        Self { threshold: 0.85 }
    }
}

impl ConvergenceStrategy for AgreementConvergence {
    fn converged(&self, round: &[AgentResponse]) -> bool {
        !round.is_empty() && mean_pairwise_agreement(round) >= self.threshold
    }
}

/// Default synthesis: prefer the designated Synthesizer role's response;
/// otherwise pick the response that agrees most with the rest of the round,
/// ties broken by invocation order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SynthesizerPreference;

impl SynthesisStrategy for SynthesizerPreference {
    fn synthesize(&self, final_round: &[AgentResponse]) -> Option<String> {
        if let Some(synth) = final_round
            .iter()
            .find(|r| r.role == AgentRole::Synthesizer)
        {
            return Some(synth.content.clone());
        }

        let sets: Vec<BTreeSet<String>> =
            final_round.iter().map(|r| token_set(&r.content)).collect();
        let mut best: Option<(usize, f64)> = None;
        for i in 0..final_round.len() {
            let agreement: f64 = sets
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, other)| jaccard(&sets[i], other))
                .sum();
            // Strictly-greater keeps the earliest response on ties.
            if best.map_or(true, |(_, b)| agreement > b) {
                best = Some((i, agreement));
            }
        }
        best.map(|(i, _)| final_round[i].content.clone())
    }
}
