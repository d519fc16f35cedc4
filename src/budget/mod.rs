//! Budget monitoring system
//! Append-only consumption ledger, status classification and step charging

pub mod monitor;
pub mod types;
pub mod cost;

pub use monitor::{classify, BudgetMonitor};
pub use types::{BudgetDimension, BudgetObserver, BudgetStatus, BudgetSummary, ConsumptionEntry};
pub use cost::{CostEstimator, FixedCostTable, StepCost};
