//! Per-step cost estimation
//!
//! Executor spend is not introspectable while a step runs, so each step is
//! charged a fixed estimate keyed by (tier, step). This is an approximation;
//! swap in another `CostEstimator` to change it.

use crate::assessment::{ComplexityTier, PipelineStep};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Estimated charge for one step invocation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepCost {
    /// Cost in USD
    pub cost: f64,

    /// Messages consumed
    pub messages: u32,
}

impl StepCost {
    pub fn new(cost: f64, messages: u32) -> Self {
        Self { cost, messages }
    }
}

impl Default for StepCost {
    fn default() -> Self {
        Self {
            cost: 0.0,
            messages: 1,
        }
    }
}

/// Strategy for charging a step
pub trait CostEstimator: Send + Sync {
    fn estimate(&self, tier: ComplexityTier, step: PipelineStep) -> StepCost;
}

/// Fixed cost table keyed by (tier, step)
#[derive(Debug, Clone, PartialEq)]
pub struct FixedCostTable {
    costs: HashMap<(ComplexityTier, PipelineStep), StepCost>,
}

impl FixedCostTable {
    /// Empty table; every lookup falls back to `StepCost::default()`
    pub fn empty() -> Self {
        Self {
            costs: HashMap::new(),
        }
    }

    /// Set the charge for a (tier, step) pair
    pub fn set(&mut self, tier: ComplexityTier, step: PipelineStep, cost: StepCost) {
        self.costs.insert((tier, step), cost);
    }

    /// Builder form of `set`
    pub fn with(mut self, tier: ComplexityTier, step: PipelineStep, cost: StepCost) -> Self {
        self.set(tier, step, cost);
        self
    }

    /// Charge for a pair, if configured
    pub fn get(&self, tier: ComplexityTier, step: PipelineStep) -> Option<StepCost> {
        self.costs.get(&(tier, step)).copied()
    }

    /// Sum of configured charges over a pipeline
    pub fn pipeline_total(&self, tier: ComplexityTier, steps: &[PipelineStep]) -> StepCost {
        steps.iter().fold(StepCost::new(0.0, 0), |acc, step| {
            let cost = self.estimate(tier, *step);
            StepCost::new(acc.cost + cost.cost, acc.messages + cost.messages)
        })
    }
}

impl Default for FixedCostTable {
    fn default() -> Self {
        use ComplexityTier::*;
        use PipelineStep::*;

        let defaults = [
            (Simple, Plan, 0.10, 2),
            (Simple, Backend, 0.25, 4),
            (Simple, Frontend, 0.25, 4),
            (Medium, Plan, 0.20, 3),
            (Medium, Backend, 0.60, 8),
            (Medium, Frontend, 0.60, 8),
            (Medium, Test, 0.40, 5),
            (Complex, Plan, 0.50, 5),
            (Complex, Architecture, 1.00, 8),
            (Complex, Backend, 2.00, 20),
            (Complex, Frontend, 2.00, 20),
            (Complex, Test, 1.00, 10),
            (Complex, Review, 0.75, 6),
        ];

        let mut table = Self::empty();
        for (tier, step, cost, messages) in defaults {
            table.set(tier, step, StepCost::new(cost, messages));
        }
        table
    }
}

impl CostEstimator for FixedCostTable {
    fn estimate(&self, tier: ComplexityTier, step: PipelineStep) -> StepCost {
        self.get(tier, step).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::ResourceEnvelope;

    #[test]
    fn test_default_pipelines_fit_their_envelopes() {
        let table = FixedCostTable::default();
        for tier in ComplexityTier::ALL {
            let envelope = ResourceEnvelope::default_for(tier);
            let total = table.pipeline_total(tier, &envelope.pipeline_steps);
            assert!(total.cost <= envelope.max_cost, "{} cost {}", tier, total.cost);
            assert!(total.messages <= envelope.max_messages, "{} messages {}", tier, total.messages);
        }
    }

    #[test]
    fn test_unknown_pair_falls_back() {
        let table = FixedCostTable::default();
        let cost = table.estimate(ComplexityTier::Simple, PipelineStep::Review);
        assert_eq!(cost, StepCost::default());
    }

    #[test]
    fn test_override() {
        let table = FixedCostTable::default().with(
            ComplexityTier::Simple,
            PipelineStep::Plan,
            StepCost::new(0.9, 1),
        );
        assert_eq!(table.estimate(ComplexityTier::Simple, PipelineStep::Plan).cost, 0.9);
    }
}
