//! Type definitions module
//!
//! Records that cross the engine boundary: the task coming in and the
//! execution result going out.

pub mod task;
pub use task::TaskDescriptor;

pub mod execution;
pub use execution::{
    ExecutionResult, ExecutionStatus, StepOutput, StepOutputs, TerminationPhase, TerminationReason,
};
