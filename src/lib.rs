//! tiergate - complexity-tiered, budget-gated pipeline orchestration
//!
//! Routes each task through a pipeline sized to its estimated complexity and
//! enforces hard ceilings on messages, cost and wall-clock time while the
//! pipeline runs, so trivial work never pays for a pipeline built for
//! complex work.
//!
//! # Architecture
//!
//! - **Assessment**: task text → complexity tier → resource envelope
//! - **Budget**: append-only consumption ledger with status classification
//! - **Pipeline**: state machine driving external step executors
//! - **Analysis**: post-hoc efficiency reports over finished runs
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tiergate::{ComplexityAssessor, Orchestrator, StaticExecutor, TaskDescriptor};
//!
//! # async fn demo() -> tiergate::Result<()> {
//! let orchestrator = Orchestrator::builder(Arc::new(ComplexityAssessor::default()))
//!     .with_executor_for_all(Arc::new(StaticExecutor::new(json!({"ok": true}))))
//!     .build()?;
//!
//! let result = orchestrator.run(&TaskDescriptor::from_text("Fix a typo")).await;
//! println!("{}", result.summary_line());
//! # Ok(())
//! # }
//! ```

pub mod errors;
pub mod config;
pub mod types;
pub mod assessment;
pub mod budget;
pub mod pipeline;
pub mod analysis;
pub mod history;
pub mod telemetry;

// Re-export commonly used types
pub use errors::{Result, TierGateError};
pub use config::Config;
pub use types::{ExecutionResult, ExecutionStatus, StepOutput, TaskDescriptor};
pub use assessment::{ComplexityAssessor, ComplexityTier, PipelineStep, ResourceEnvelope, TierTable};
pub use budget::{BudgetMonitor, BudgetObserver, BudgetStatus, CostEstimator, FixedCostTable};
pub use pipeline::{Orchestrator, OrchestratorBuilder, RunState, StaticExecutor, StepExecutor};
pub use analysis::{EfficiencyAnalyzer, EfficiencyReport};
pub use history::{InMemoryRunRepository, JsonFileRunRepository, RunRepository};
pub use telemetry::TelemetryCollector;
