//! Pipeline execution: run state machine, step executors and the orchestrator

pub mod state;
pub mod executor;
pub mod orchestrator;

pub use state::{RunEvent, RunState};
pub use executor::{GateDecision, GateSource, PriorOutputs, StaticExecutor, StepExecutor, StepGates};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
