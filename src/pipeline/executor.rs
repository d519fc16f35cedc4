//! Step executors and step gating
//!
//! The orchestrator never does step work itself. Each `PipelineStep` is
//! bound to a `StepExecutor` that receives the task, the outputs of the
//! steps that already ran, and a read-only view of the run's budget.

use crate::assessment::{ComplexityTier, PipelineStep};
use crate::budget::BudgetMonitor;
use crate::types::{StepOutput, StepOutputs, TaskDescriptor};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// Outputs of the steps that ran so far, in execution order
pub type PriorOutputs = StepOutputs;

/// Performs the work of one pipeline step
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Execute the step. An `Err` fails the run; it is not retried.
    async fn execute(
        &self,
        task: &TaskDescriptor,
        prior: &PriorOutputs,
        monitor: &BudgetMonitor,
    ) -> anyhow::Result<StepOutput>;
}

/// Executor that always returns the same payload
#[derive(Debug, Clone)]
pub struct StaticExecutor {
    payload: Value,
    tokens: u64,
}

impl StaticExecutor {
    pub fn new(payload: Value) -> Self {
        Self { payload, tokens: 0 }
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }
}

#[async_trait]
impl StepExecutor for StaticExecutor {
    async fn execute(
        &self,
        _task: &TaskDescriptor,
        _prior: &PriorOutputs,
        _monitor: &BudgetMonitor,
    ) -> anyhow::Result<StepOutput> {
        Ok(StepOutput::new(self.payload.clone()).with_tokens(self.tokens))
    }
}

/// Where a gate decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateSource {
    /// Step has no gate
    Ungated,

    /// A prior step declared the flag
    Declared(PipelineStep),

    /// No prior output carried a boolean flag
    Fallback,
}

/// Outcome of evaluating a step gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateDecision {
    pub run: bool,
    pub source: GateSource,
}

/// Decides whether gated steps run, based on flags in prior outputs.
///
/// `Backend` is gated by `backend_changes_required` and `Frontend` by
/// `frontend_changes_required`. The latest prior output carrying the flag
/// as a boolean wins. Without one the tier fallback applies: backend runs
/// for Medium and Complex only, frontend always runs.
#[derive(Debug, Clone, Default)]
pub struct StepGates;

impl StepGates {
    pub const BACKEND_FLAG: &'static str = "backend_changes_required";
    pub const FRONTEND_FLAG: &'static str = "frontend_changes_required";

    pub fn new() -> Self {
        Self
    }

    /// Flag key gating `step`, if any
    pub fn flag_for(step: PipelineStep) -> Option<&'static str> {
        match step {
            PipelineStep::Backend => Some(Self::BACKEND_FLAG),
            PipelineStep::Frontend => Some(Self::FRONTEND_FLAG),
            _ => None,
        }
    }

    /// Value used when no prior output declares the flag
    pub fn fallback(tier: ComplexityTier, step: PipelineStep) -> bool {
        match step {
            PipelineStep::Backend => tier != ComplexityTier::Simple,
            _ => true,
        }
    }

    /// Evaluate the gate for `step`
    pub fn evaluate(
        &self,
        tier: ComplexityTier,
        step: PipelineStep,
        prior: &PriorOutputs,
    ) -> GateDecision {
        let Some(flag) = Self::flag_for(step) else {
            return GateDecision {
                run: true,
                source: GateSource::Ungated,
            };
        };

        let declared = prior
            .iter()
            .rev()
            .find_map(|(source, output)| output.get_bool(flag).map(|run| (source, run)));

        if let Some((source, run)) = declared {
            debug!(step = %step, flag, run, from = %source, "step gate declared");
            return GateDecision {
                run,
                source: GateSource::Declared(source),
            };
        }

        let malformed = prior
            .values()
            .any(|output| output.payload.get(flag).is_some());
        let run = Self::fallback(tier, step);
        if malformed {
            warn!(step = %step, flag, run, "gate flag is not a boolean, using tier fallback");
        } else {
            warn!(step = %step, flag, run, "gate flag missing from prior outputs, using tier fallback");
        }

        GateDecision {
            run,
            source: GateSource::Fallback,
        }
    }

    /// Shorthand for `evaluate(..).run`
    pub fn should_run(&self, tier: ComplexityTier, step: PipelineStep, prior: &PriorOutputs) -> bool {
        self.evaluate(tier, step, prior).run
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::ResourceEnvelope;
    use serde_json::json;

    fn prior(entries: &[(PipelineStep, Value)]) -> PriorOutputs {
        entries
            .iter()
            .map(|(step, payload)| (*step, StepOutput::new(payload.clone())))
            .collect()
    }

    #[test]
    fn test_ungated_steps_always_run() {
        let gates = StepGates::new();
        for step in [PipelineStep::Plan, PipelineStep::Test, PipelineStep::Review] {
            let decision = gates.evaluate(ComplexityTier::Simple, step, &PriorOutputs::new());
            assert_eq!(decision, GateDecision { run: true, source: GateSource::Ungated });
        }
    }

    #[test]
    fn test_declared_flag_wins() {
        let gates = StepGates::new();
        let prior = prior(&[(
            PipelineStep::Plan,
            json!({"backend_changes_required": false, "frontend_changes_required": true}),
        )]);

        let backend = gates.evaluate(ComplexityTier::Complex, PipelineStep::Backend, &prior);
        assert!(!backend.run);
        assert_eq!(backend.source, GateSource::Declared(PipelineStep::Plan));
        assert!(gates.should_run(ComplexityTier::Simple, PipelineStep::Frontend, &prior));
    }

    #[test]
    fn test_latest_declaration_wins() {
        let gates = StepGates::new();
        let prior = prior(&[
            (PipelineStep::Plan, json!({"frontend_changes_required": true})),
            (PipelineStep::Architecture, json!({"frontend_changes_required": false})),
        ]);
        let decision = gates.evaluate(ComplexityTier::Complex, PipelineStep::Frontend, &prior);
        assert!(!decision.run);
        assert_eq!(decision.source, GateSource::Declared(PipelineStep::Architecture));
    }

    #[test]
    fn test_latest_declaration_follows_execution_order() {
        // review ran before architecture, so architecture's flag is the latest
        let gates = StepGates::new();
        let prior = prior(&[
            (PipelineStep::Plan, json!({})),
            (PipelineStep::Review, json!({"backend_changes_required": false})),
            (PipelineStep::Architecture, json!({"backend_changes_required": true})),
        ]);
        let decision = gates.evaluate(ComplexityTier::Medium, PipelineStep::Backend, &prior);
        assert!(decision.run);
        assert_eq!(decision.source, GateSource::Declared(PipelineStep::Architecture));
        assert_eq!(
            prior.steps(),
            vec![PipelineStep::Plan, PipelineStep::Review, PipelineStep::Architecture]
        );
    }

    #[test]
    fn test_missing_flag_uses_tier_fallback() {
        let gates = StepGates::new();
        let prior = prior(&[(PipelineStep::Plan, json!({"summary": "add a button"}))]);

        assert!(!gates.should_run(ComplexityTier::Simple, PipelineStep::Backend, &prior));
        assert!(gates.should_run(ComplexityTier::Medium, PipelineStep::Backend, &prior));
        assert!(gates.should_run(ComplexityTier::Complex, PipelineStep::Backend, &prior));
        assert!(gates.should_run(ComplexityTier::Simple, PipelineStep::Frontend, &prior));
    }

    #[test]
    fn test_malformed_flag_uses_tier_fallback() {
        let gates = StepGates::new();
        let prior = prior(&[(PipelineStep::Plan, json!({"backend_changes_required": "yes"}))]);
        let decision = gates.evaluate(ComplexityTier::Simple, PipelineStep::Backend, &prior);
        assert_eq!(decision, GateDecision { run: false, source: GateSource::Fallback });
    }

    #[tokio::test]
    async fn test_static_executor() {
        let executor = StaticExecutor::new(json!({"ok": true})).with_tokens(42);
        let monitor = BudgetMonitor::new(ResourceEnvelope::default_for(ComplexityTier::Simple));
        let output = executor
            .execute(&TaskDescriptor::default(), &PriorOutputs::new(), &monitor)
            .await
            .unwrap();
        assert_eq!(output.get_bool("ok"), Some(true));
        assert_eq!(output.tokens, 42);
    }
}
