//! Budget system type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// One append-only ledger record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsumptionEntry {
    /// When the consumption was recorded
    pub timestamp: DateTime<Utc>,

    /// Step that consumed the resources
    pub step_id: String,

    /// Incremental cost in USD
    pub cost: f64,

    /// Incremental message count
    pub message_delta: u32,

    /// Incremental token count
    pub token_count: u64,

    /// Free-form metadata
    #[serde(default)]
    pub metadata: Value,
}

/// Budget classification, recomputed on demand and never stored.
///
/// When several conditions hold at once the first variant listed wins,
/// except `WithinBudget` which only applies when nothing else does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    WithinBudget,
    ApproachingLimit,
    CostExceeded,
    MessageLimitExceeded,
    TimeLimitExceeded,
}

impl BudgetStatus {
    /// True for the three ceiling-exceeded states
    pub fn is_exceeded(&self) -> bool {
        self.exceeded_dimension().is_some()
    }

    /// The exceeded dimension, if any
    pub fn exceeded_dimension(&self) -> Option<BudgetDimension> {
        match self {
            BudgetStatus::CostExceeded => Some(BudgetDimension::Cost),
            BudgetStatus::MessageLimitExceeded => Some(BudgetDimension::Messages),
            BudgetStatus::TimeLimitExceeded => Some(BudgetDimension::Time),
            BudgetStatus::WithinBudget | BudgetStatus::ApproachingLimit => None,
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BudgetStatus::WithinBudget => "within_budget",
            BudgetStatus::ApproachingLimit => "approaching_limit",
            BudgetStatus::CostExceeded => "cost_exceeded",
            BudgetStatus::MessageLimitExceeded => "message_limit_exceeded",
            BudgetStatus::TimeLimitExceeded => "time_limit_exceeded",
        };
        f.write_str(name)
    }
}

/// Resource dimension a ceiling applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetDimension {
    Cost,
    Messages,
    Time,
}

impl fmt::Display for BudgetDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BudgetDimension::Cost => "cost",
            BudgetDimension::Messages => "messages",
            BudgetDimension::Time => "time",
        };
        f.write_str(name)
    }
}

/// Snapshot of a monitor's totals and derived scores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSummary {
    pub total_cost: f64,
    pub total_messages: u64,
    pub total_tokens: u64,
    pub elapsed_secs: f64,
    pub cost_by_step: BTreeMap<String, f64>,

    /// Consumed / ceiling, unclamped
    pub cost_ratio: f64,
    pub message_ratio: f64,
    pub time_ratio: f64,

    /// 0.0 to 1.0, higher is better
    pub efficiency_score: f64,
    pub status: BudgetStatus,
}

/// Callback invoked synchronously when a recorded consumption leaves the
/// budget in any state other than `WithinBudget`.
///
/// Implementations must not panic; a panic is caught and logged by the
/// monitor and never reaches the caller of `record_consumption`.
pub trait BudgetObserver: Send + Sync {
    fn on_budget_status_change(&self, status: BudgetStatus, summary: &BudgetSummary);
}

impl<F> BudgetObserver for F
where
    F: Fn(BudgetStatus, &BudgetSummary) + Send + Sync,
{
    fn on_budget_status_change(&self, status: BudgetStatus, summary: &BudgetSummary) {
        self(status, summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exceeded_dimensions() {
        assert_eq!(BudgetStatus::CostExceeded.exceeded_dimension(), Some(BudgetDimension::Cost));
        assert_eq!(
            BudgetStatus::MessageLimitExceeded.exceeded_dimension(),
            Some(BudgetDimension::Messages)
        );
        assert_eq!(BudgetStatus::TimeLimitExceeded.exceeded_dimension(), Some(BudgetDimension::Time));
        assert!(!BudgetStatus::ApproachingLimit.is_exceeded());
        assert!(!BudgetStatus::WithinBudget.is_exceeded());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&BudgetStatus::MessageLimitExceeded).unwrap();
        assert_eq!(json, "\"message_limit_exceeded\"");
        assert_eq!(BudgetStatus::CostExceeded.to_string(), "cost_exceeded");
    }
}
