//! Execution result types
//!
//! `ExecutionResult` is the single record handed across the engine boundary
//! to reporting and persistence layers. It is produced once per run and not
//! modified afterwards.

use crate::assessment::{ComplexityMetrics, ComplexityTier, PipelineStep};
use crate::budget::{BudgetDimension, BudgetStatus, BudgetSummary};
use crate::pipeline::RunState;
use chrono::{DateTime, Utc};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Output of one step executor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutput {
    /// Step-specific content. Always a JSON object once stored in a result.
    pub payload: Value,

    /// Tokens the executor reports having used
    #[serde(default)]
    pub tokens: u64,
}

impl StepOutput {
    /// Create an output from a payload
    pub fn new(payload: Value) -> Self {
        Self { payload, tokens: 0 }
    }

    /// Attach a token count
    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = tokens;
        self
    }

    /// Boolean value under `key`, if the payload has one
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.payload.get(key).and_then(Value::as_bool)
    }

    /// String value under `key`, if the payload has one
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Wrap a non-object payload as `{"value": payload}`
    pub fn normalized(self) -> Self {
        let payload = match self.payload {
            Value::Object(_) => self.payload,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                Value::Object(map)
            }
        };
        Self {
            payload,
            tokens: self.tokens,
        }
    }

    /// True when the payload is already an object
    pub fn is_object(&self) -> bool {
        self.payload.is_object()
    }
}

/// Step outputs in the order the steps ran.
///
/// Serialized as a map from step id to output, keeping execution order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutputs {
    entries: Vec<(PipelineStep, StepOutput)>,
}

impl StepOutputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the output of `step`. A step that already has an output is
    /// moved to the end with the new value.
    pub fn insert(&mut self, step: PipelineStep, output: StepOutput) {
        self.entries.retain(|(existing, _)| *existing != step);
        self.entries.push((step, output));
    }

    pub fn get(&self, step: &PipelineStep) -> Option<&StepOutput> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == step)
            .map(|(_, output)| output)
    }

    pub fn contains_key(&self, step: &PipelineStep) -> bool {
        self.get(step).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in execution order
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (PipelineStep, &StepOutput)> {
        self.entries.iter().map(|(step, output)| (*step, output))
    }

    /// Steps in execution order
    pub fn steps(&self) -> Vec<PipelineStep> {
        self.entries.iter().map(|(step, _)| *step).collect()
    }

    pub fn values(&self) -> impl Iterator<Item = &StepOutput> {
        self.entries.iter().map(|(_, output)| output)
    }
}

impl FromIterator<(PipelineStep, StepOutput)> for StepOutputs {
    fn from_iter<I: IntoIterator<Item = (PipelineStep, StepOutput)>>(iter: I) -> Self {
        let mut outputs = StepOutputs::new();
        for (step, output) in iter {
            outputs.insert(step, output);
        }
        outputs
    }
}

impl std::ops::Index<&PipelineStep> for StepOutputs {
    type Output = StepOutput;

    fn index(&self, step: &PipelineStep) -> &StepOutput {
        match self.get(step) {
            Some(output) => output,
            None => panic!("no output recorded for step '{}'", step),
        }
    }
}

impl Serialize for StepOutputs {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(step, output)| (step, output)))
    }
}

impl<'de> Deserialize<'de> for StepOutputs {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OutputsVisitor;

        impl<'de> Visitor<'de> for OutputsVisitor {
            type Value = StepOutputs;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of step ids to step outputs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<StepOutputs, A::Error> {
                let mut outputs = StepOutputs::new();
                while let Some((step, output)) = access.next_entry::<PipelineStep, StepOutput>()? {
                    outputs.insert(step, output);
                }
                Ok(outputs)
            }
        }

        deserializer.deserialize_map(OutputsVisitor)
    }
}

/// Terminal status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Terminated,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Terminated => "terminated",
            ExecutionStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a budget check stopped the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationPhase {
    /// Before the step was invoked; the step never ran
    PreCheck,

    /// After the step's consumption was recorded
    PostCheck,
}

/// Why a run terminated early
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminationReason {
    /// Step that triggered termination
    pub step: PipelineStep,

    /// Exceeded dimension at that instant
    pub dimension: BudgetDimension,

    pub phase: TerminationPhase,

    /// Monitor status at that instant
    pub status: BudgetStatus,
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let when = match self.phase {
            TerminationPhase::PreCheck => "before",
            TerminationPhase::PostCheck => "after",
        };
        write!(f, "{} limit exceeded {} step '{}'", self.dimension, when, self.step)
    }
}

/// Record of one orchestrator run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub task_summary: String,
    pub tier: ComplexityTier,

    /// Pipeline identifier (the tier label)
    pub pipeline: String,
    pub status: ExecutionStatus,

    pub total_cost: f64,
    pub total_messages: u64,
    pub total_tokens: u64,
    pub duration_secs: f64,

    /// Outputs of steps that returned, in execution order
    pub step_outputs: StepOutputs,

    /// Steps gated out by prior outputs
    pub skipped_steps: Vec<PipelineStep>,

    /// True iff `status` is `Terminated`
    pub early_termination: bool,
    pub termination_reason: Option<TerminationReason>,

    /// Error chain of the failing executor, if the run failed
    pub error: Option<String>,
    pub failed_step: Option<PipelineStep>,

    /// Every state entered, in order, ending in exactly one terminal state
    pub states: Vec<RunState>,

    pub budget: BudgetSummary,
    pub metrics: ComplexityMetrics,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ExecutionResult {
    /// Number of steps whose executor was invoked
    pub fn steps_invoked(&self) -> usize {
        self.states
            .iter()
            .filter(|state| matches!(state, RunState::Step { .. }))
            .count()
    }

    pub fn is_completed(&self) -> bool {
        self.status == ExecutionStatus::Completed
    }

    /// One-line human-readable summary
    pub fn summary_line(&self) -> String {
        let detail = match (&self.termination_reason, &self.error) {
            (Some(reason), _) => format!(" ({})", reason),
            (None, Some(error)) => format!(" ({})", error),
            (None, None) => String::new(),
        };
        format!(
            "{} [{}] {}{} in {:.2}s: ${:.2}, {} messages, efficiency {:.2}",
            self.status,
            self.tier,
            self.task_summary,
            detail,
            self.duration_secs,
            self.total_cost,
            self.total_messages,
            self.budget.efficiency_score
        )
    }
}
