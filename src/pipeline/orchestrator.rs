//! Pipeline orchestrator - main coordinator
//!
//! Drives one task through the pipeline of its complexity tier:
//! - Assessment of tier and resource envelope
//! - State machine transitions, recorded as a trail
//! - Step gating from prior outputs
//! - Budget checks before and after every invoked step
//!
//! Each run owns a fresh `BudgetMonitor`, so one orchestrator can drive
//! independent runs concurrently.

use crate::assessment::{ComplexityAssessor, ComplexityTier, PipelineStep};
use crate::budget::{BudgetMonitor, BudgetObserver, BudgetStatus, CostEstimator, FixedCostTable};
use crate::errors::{Result, TierGateError};
use crate::pipeline::executor::{PriorOutputs, StepExecutor, StepGates};
use crate::pipeline::state::{RunEvent, RunState};
use crate::telemetry::{TelemetryCollector, TelemetryEvent};
use crate::types::{
    ExecutionResult, ExecutionStatus, TaskDescriptor, TerminationPhase, TerminationReason,
};
use chrono::Utc;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Source of a run's start instant
pub type RunClock = Arc<dyn Fn() -> Instant + Send + Sync>;

/// Builder for `Orchestrator`
pub struct OrchestratorBuilder {
    assessor: Arc<ComplexityAssessor>,
    executors: HashMap<PipelineStep, Arc<dyn StepExecutor>>,
    cost_estimator: Arc<dyn CostEstimator>,
    gates: StepGates,
    observers: Vec<Arc<dyn BudgetObserver>>,
    telemetry: Option<TelemetryCollector>,
    clock: RunClock,
}

impl OrchestratorBuilder {
    /// Start a builder around an assessor. Costs default to `FixedCostTable::default()`.
    pub fn new(assessor: Arc<ComplexityAssessor>) -> Self {
        Self {
            assessor,
            executors: HashMap::new(),
            cost_estimator: Arc::new(FixedCostTable::default()),
            gates: StepGates::new(),
            observers: Vec::new(),
            telemetry: None,
            clock: Arc::new(Instant::now),
        }
    }

    /// Bind an executor to a step, replacing any previous binding
    pub fn with_executor(mut self, step: PipelineStep, executor: Arc<dyn StepExecutor>) -> Self {
        self.executors.insert(step, executor);
        self
    }

    /// Bind one executor to every step
    pub fn with_executor_for_all(mut self, executor: Arc<dyn StepExecutor>) -> Self {
        for step in PipelineStep::ALL {
            self.executors.insert(step, executor.clone());
        }
        self
    }

    pub fn with_cost_estimator(mut self, estimator: Arc<dyn CostEstimator>) -> Self {
        self.cost_estimator = estimator;
        self
    }

    /// Observer registered on every run's monitor, in call order
    pub fn with_observer(mut self, observer: Arc<dyn BudgetObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn with_telemetry(mut self, telemetry: TelemetryCollector) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// Clock read once per run for the budget's start instant.
    /// Defaults to `Instant::now`.
    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> Instant + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    /// Validate and build. Every step of every tier's pipeline needs an executor.
    pub fn build(self) -> Result<Orchestrator> {
        let mut required: Vec<PipelineStep> = self
            .assessor
            .tiers()
            .iter()
            .flat_map(|(_, envelope)| envelope.pipeline_steps.iter().copied())
            .collect();
        required.sort();
        required.dedup();

        if let Some(step) = required
            .into_iter()
            .find(|step| !self.executors.contains_key(step))
        {
            return Err(TierGateError::MissingExecutor {
                step: step.to_string(),
            });
        }

        Ok(Orchestrator {
            assessor: self.assessor,
            executors: self.executors,
            cost_estimator: self.cost_estimator,
            gates: self.gates,
            observers: self.observers,
            telemetry: self.telemetry,
            clock: self.clock,
        })
    }
}

/// Budget-gated pipeline orchestrator
pub struct Orchestrator {
    assessor: Arc<ComplexityAssessor>,
    executors: HashMap<PipelineStep, Arc<dyn StepExecutor>>,
    cost_estimator: Arc<dyn CostEstimator>,
    gates: StepGates,
    observers: Vec<Arc<dyn BudgetObserver>>,
    telemetry: Option<TelemetryCollector>,
    clock: RunClock,
}

/// Mutable state of a single run
struct RunContext {
    state: RunState,
    states: Vec<RunState>,
    monitor: BudgetMonitor,
    outputs: PriorOutputs,
    skipped: Vec<PipelineStep>,
    termination: Option<TerminationReason>,
    failed_step: Option<PipelineStep>,
    error: Option<String>,
    telemetry: Option<TelemetryCollector>,
}

impl RunContext {
    fn advance(&mut self, event: RunEvent) -> Result<()> {
        let next = self.state.transition(event)?;
        debug!(from = %self.state, to = %next, "state transition");
        if let Some(telemetry) = &self.telemetry {
            telemetry.record(TelemetryEvent::StateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
                timestamp: Instant::now(),
            });
        }
        self.state = next;
        self.states.push(next);
        Ok(())
    }

    /// Terminate if the monitor reports an exceeded ceiling
    fn check_budget(&mut self, step: PipelineStep, phase: TerminationPhase) -> Result<bool> {
        let status = self.monitor.status();
        let Some(dimension) = status.exceeded_dimension() else {
            return Ok(false);
        };

        let reason = TerminationReason {
            step,
            dimension,
            phase,
            status,
        };
        warn!(reason = %reason, "terminating run");
        self.termination = Some(reason);
        self.advance(RunEvent::BudgetExceeded)?;
        Ok(true)
    }

    fn record(&self, event: TelemetryEvent) {
        if let Some(telemetry) = &self.telemetry {
            telemetry.record(event);
        }
    }
}

impl Orchestrator {
    /// Start building an orchestrator
    pub fn builder(assessor: Arc<ComplexityAssessor>) -> OrchestratorBuilder {
        OrchestratorBuilder::new(assessor)
    }

    pub fn assessor(&self) -> &Arc<ComplexityAssessor> {
        &self.assessor
    }

    /// Execute a task end to end.
    ///
    /// Never returns an error: executor failures and internal faults both
    /// become a `Failed` result.
    pub async fn run(&self, task: &TaskDescriptor) -> ExecutionResult {
        let started_at = Utc::now();
        let analysis = self.assessor.analyze(task);
        let tier = analysis.tier;
        let envelope = analysis.envelope.clone();

        info!(
            tier = %tier,
            steps = envelope.pipeline_steps.len(),
            max_cost = envelope.max_cost,
            max_messages = envelope.max_messages,
            "starting run"
        );

        let mut monitor = BudgetMonitor::with_start(envelope.clone(), (self.clock)());
        for observer in &self.observers {
            monitor.register_observer(observer.clone());
        }
        if let Some(telemetry) = &self.telemetry {
            monitor.register_observer(Arc::new(telemetry.clone()));
        }

        let mut ctx = RunContext {
            state: RunState::Assessing,
            states: vec![RunState::Assessing],
            monitor,
            outputs: PriorOutputs::new(),
            skipped: Vec::new(),
            termination: None,
            failed_step: None,
            error: None,
            telemetry: self.telemetry.clone(),
        };

        if let Err(e) = self.drive(tier, &envelope.pipeline_steps, task, &mut ctx).await {
            error!(error = %e, "run aborted by internal error");
            if let RunState::Step { step, .. } = ctx.state {
                ctx.failed_step = Some(step);
            }
            ctx.error = Some(e.to_string());
            if !ctx.state.is_terminal() {
                ctx.state = RunState::Failed;
                ctx.states.push(RunState::Failed);
            }
        }

        let status = match ctx.state {
            RunState::Completed => ExecutionStatus::Completed,
            RunState::Terminated => ExecutionStatus::Terminated,
            _ => ExecutionStatus::Failed,
        };

        let summary = ctx.monitor.summary();

        let result = ExecutionResult {
            run_id: Uuid::new_v4(),
            task_summary: task.summary.clone(),
            tier,
            pipeline: envelope.tier_label.clone(),
            status,
            total_cost: summary.total_cost,
            total_messages: summary.total_messages,
            total_tokens: summary.total_tokens,
            duration_secs: summary.elapsed_secs,
            step_outputs: ctx.outputs,
            skipped_steps: ctx.skipped,
            early_termination: status == ExecutionStatus::Terminated,
            termination_reason: ctx.termination,
            error: ctx.error,
            failed_step: ctx.failed_step,
            states: ctx.states,
            budget: summary,
            metrics: analysis.metrics,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            run_id = %result.run_id,
            status = %result.status,
            total_cost = result.total_cost,
            total_messages = result.total_messages,
            steps_invoked = result.steps_invoked(),
            "run finished"
        );

        result
    }

    async fn drive(
        &self,
        tier: ComplexityTier,
        steps: &[PipelineStep],
        task: &TaskDescriptor,
        ctx: &mut RunContext,
    ) -> Result<()> {
        for (index, step) in steps.iter().copied().enumerate() {
            if !self.gates.should_run(tier, step, &ctx.outputs) {
                info!(step = %step, "skipping step");
                ctx.skipped.push(step);
                ctx.record(TelemetryEvent::StepSkipped {
                    step,
                    timestamp: Instant::now(),
                });
                continue;
            }

            if ctx.check_budget(step, TerminationPhase::PreCheck)? {
                return Ok(());
            }

            let estimate = self.cost_estimator.estimate(tier, step);
            let projected = ctx.monitor.peek_status(estimate.cost);
            if projected != BudgetStatus::WithinBudget {
                if projected.is_exceeded() {
                    warn!(step = %step, projected = %projected, "step is projected to exceed the budget");
                }
                ctx.record(TelemetryEvent::BudgetProjection {
                    step,
                    projected,
                    timestamp: Instant::now(),
                });
            }

            let executor = self
                .executors
                .get(&step)
                .ok_or_else(|| TierGateError::MissingExecutor {
                    step: step.to_string(),
                })?;

            ctx.advance(RunEvent::EnterStep { index, step })?;
            ctx.record(TelemetryEvent::StepStarted {
                step,
                timestamp: Instant::now(),
            });
            let step_start = Instant::now();

            let outcome = executor.execute(task, &ctx.outputs, &ctx.monitor).await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            match outcome {
                Ok(output) => {
                    if !output.is_object() {
                        warn!(step = %step, "step output is not an object, wrapping it");
                    }
                    let output = output.normalized();

                    ctx.monitor.record_consumption(
                        step.id(),
                        estimate.cost,
                        estimate.messages,
                        output.tokens,
                        json!({ "tier": tier.label(), "step_index": index }),
                    );
                    ctx.record(TelemetryEvent::StepCompleted {
                        step,
                        duration_ms,
                        success: true,
                        cost: estimate.cost,
                        timestamp: Instant::now(),
                    });
                    debug!(step = %step, duration_ms, cost = estimate.cost, "step completed");
                    ctx.outputs.insert(step, output);

                    if ctx.check_budget(step, TerminationPhase::PostCheck)? {
                        return Ok(());
                    }
                }
                Err(e) => {
                    let message = format!("{:#}", e);
                    error!(step = %step, error = %message, "step failed");
                    ctx.record(TelemetryEvent::StepCompleted {
                        step,
                        duration_ms,
                        success: false,
                        cost: 0.0,
                        timestamp: Instant::now(),
                    });
                    ctx.failed_step = Some(step);
                    ctx.error = Some(message);
                    ctx.advance(RunEvent::StepFailed)?;
                    return Ok(());
                }
            }
        }

        ctx.advance(RunEvent::PipelineFinished)
    }
}
