//! Run state machine
//!
//! Deterministic finite state machine for one orchestrator run:
//! - Safety: no invalid states reachable
//! - Liveness: every run ends in Completed, Terminated or Failed
//! - Determinism: unique next state per (state, event)
//! - Absorption: terminal states never leave

use crate::assessment::PipelineStep;
use crate::errors::{Result, TierGateError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Run execution states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunState {
    /// Initial state - tier and envelope being resolved
    Assessing,

    /// A pipeline step's executor is running
    Step { index: usize, step: PipelineStep },

    /// Last pipeline step finished within budget (terminal)
    Completed,

    /// A budget ceiling was exceeded (terminal)
    Terminated,

    /// A step executor returned an error (terminal)
    Failed,
}

/// Events that trigger state transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    /// Enter the pipeline step at `index`
    EnterStep { index: usize, step: PipelineStep },

    /// No pipeline steps remain
    PipelineFinished,

    /// Budget check found a ceiling exceeded
    BudgetExceeded,

    /// Step executor returned an error
    StepFailed,
}

impl RunState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Terminated | RunState::Failed)
    }

    /// Attempt state transition with validation
    ///
    /// Valid transitions:
    /// 1. Assessing → Step(i)          (on: EnterStep; leading gated steps are skipped)
    /// 2. Step(i)   → Step(j), j > i   (on: EnterStep; gated steps are skipped)
    /// 3. Assessing → Completed        (on: PipelineFinished, every step gated out)
    /// 4. Step(i)   → Completed        (on: PipelineFinished)
    /// 5. Assessing → Terminated       (on: BudgetExceeded, pre-check of the first invoked step)
    /// 6. Step(i)   → Terminated       (on: BudgetExceeded)
    /// 7. Step(i)   → Failed           (on: StepFailed)
    /// 8. terminal  → itself           (absorbing)
    pub fn transition(&self, event: RunEvent) -> Result<RunState> {
        use RunEvent::*;
        use RunState::*;

        if self.is_terminal() {
            return Ok(*self);
        }

        let next_state = match (*self, event) {
            (Assessing, EnterStep { index, step }) => Step { index, step },
            (Step { index: current, .. }, EnterStep { index, step }) if index > current => {
                Step { index, step }
            }
            (Assessing | Step { .. }, PipelineFinished) => Completed,
            (Assessing | Step { .. }, BudgetExceeded) => Terminated,
            (Step { .. }, StepFailed) => Failed,

            (from, event) => {
                return Err(TierGateError::InvalidTransition {
                    from: from.to_string(),
                    to: format!("(via {:?})", event),
                    reason: format!("No valid transition from {} on {:?}", from, event),
                });
            }
        };

        Ok(next_state)
    }

    /// Human-readable state name
    pub fn display_name(&self) -> &'static str {
        match self {
            RunState::Assessing => "Assessing",
            RunState::Step { .. } => "Running Step",
            RunState::Completed => "Completed",
            RunState::Terminated => "Terminated",
            RunState::Failed => "Failed",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Step { index, step } => write!(f, "Step{}({})", index + 1, step),
            other => f.write_str(other.display_name()),
        }
    }
}
