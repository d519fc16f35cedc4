//! Assessment type definitions

use crate::errors::{Result, TierGateError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default fraction of a ceiling at which a run is considered near its limit
pub const DEFAULT_WARNING_THRESHOLD: f64 = 0.8;

/// Complexity tier, ordered by the amount of work it allows
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComplexityTier {
    /// At most two acceptance criteria
    Simple,

    /// Three to five acceptance criteria
    Medium,

    /// Six or more acceptance criteria
    Complex,
}

impl ComplexityTier {
    /// All tiers in ascending order
    pub const ALL: [ComplexityTier; 3] = [
        ComplexityTier::Simple,
        ComplexityTier::Medium,
        ComplexityTier::Complex,
    ];

    /// Lowercase label used in configuration and results
    pub fn label(&self) -> &'static str {
        match self {
            ComplexityTier::Simple => "simple",
            ComplexityTier::Medium => "medium",
            ComplexityTier::Complex => "complex",
        }
    }

    /// Tier for a given acceptance-criteria count
    pub fn from_criteria_count(count: usize) -> Self {
        match count {
            0..=2 => ComplexityTier::Simple,
            3..=5 => ComplexityTier::Medium,
            _ => ComplexityTier::Complex,
        }
    }
}

impl fmt::Display for ComplexityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ComplexityTier {
    type Err = TierGateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "simple" => Ok(ComplexityTier::Simple),
            "medium" => Ok(ComplexityTier::Medium),
            "complex" => Ok(ComplexityTier::Complex),
            other => Err(TierGateError::UnknownTier(other.to_string())),
        }
    }
}

/// One unit of pipeline work handed to an external executor.
///
/// Variant order is the canonical pipeline order, so `Ord` sorts step
/// outputs the way a complex pipeline would produce them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStep {
    Plan,
    Architecture,
    Backend,
    Frontend,
    Test,
    Review,
}

impl PipelineStep {
    /// All steps in canonical order
    pub const ALL: [PipelineStep; 6] = [
        PipelineStep::Plan,
        PipelineStep::Architecture,
        PipelineStep::Backend,
        PipelineStep::Frontend,
        PipelineStep::Test,
        PipelineStep::Review,
    ];

    /// Step identifier used in ledgers and configuration
    pub fn id(&self) -> &'static str {
        match self {
            PipelineStep::Plan => "plan",
            PipelineStep::Architecture => "architecture",
            PipelineStep::Backend => "backend",
            PipelineStep::Frontend => "frontend",
            PipelineStep::Test => "test",
            PipelineStep::Review => "review",
        }
    }

    /// Default ordered steps for a tier
    pub fn default_pipeline(tier: ComplexityTier) -> Vec<PipelineStep> {
        use PipelineStep::*;
        match tier {
            ComplexityTier::Simple => vec![Plan, Backend, Frontend],
            ComplexityTier::Medium => vec![Plan, Backend, Frontend, Test],
            ComplexityTier::Complex => vec![Plan, Architecture, Backend, Frontend, Test, Review],
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PipelineStep {
    type Err = TierGateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "plan" => Ok(PipelineStep::Plan),
            "architecture" => Ok(PipelineStep::Architecture),
            "backend" => Ok(PipelineStep::Backend),
            "frontend" => Ok(PipelineStep::Frontend),
            "test" => Ok(PipelineStep::Test),
            "review" => Ok(PipelineStep::Review),
            other => Err(TierGateError::ConfigError(format!(
                "unknown pipeline step '{}'",
                other
            ))),
        }
    }
}

/// Resource ceilings and step list bound to one tier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceEnvelope {
    /// Maximum number of messages
    pub max_messages: u32,

    /// Maximum cost in USD
    pub max_cost: f64,

    /// Maximum wall-clock duration in seconds
    pub max_duration_secs: u64,

    /// Fraction of a ceiling that counts as approaching the limit
    pub warning_threshold: f64,

    /// Ordered pipeline steps for this tier
    pub pipeline_steps: Vec<PipelineStep>,

    /// Tier label, also used as the pipeline identifier
    pub tier_label: String,
}

impl ResourceEnvelope {
    /// Built-in envelope for a tier
    pub fn default_for(tier: ComplexityTier) -> Self {
        let (max_messages, max_cost, max_duration_secs) = match tier {
            ComplexityTier::Simple => (20, 1.00, 1800),
            ComplexityTier::Medium => (50, 3.00, 2700),
            ComplexityTier::Complex => (100, 10.00, 3600),
        };

        Self {
            max_messages,
            max_cost,
            max_duration_secs,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
            pipeline_steps: PipelineStep::default_pipeline(tier),
            tier_label: tier.label().to_string(),
        }
    }

    /// Override the warning threshold
    pub fn with_warning_threshold(mut self, threshold: f64) -> Self {
        self.warning_threshold = threshold;
        self
    }

    /// Override the cost ceiling
    pub fn with_max_cost(mut self, max_cost: f64) -> Self {
        self.max_cost = max_cost;
        self
    }

    /// Override the message ceiling
    pub fn with_max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = max_messages;
        self
    }

    /// Override the duration ceiling
    pub fn with_max_duration_secs(mut self, secs: u64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// Replace the pipeline steps
    pub fn with_steps(mut self, steps: Vec<PipelineStep>) -> Self {
        self.pipeline_steps = steps;
        self
    }

    /// Duration ceiling as a `Duration`
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }

    /// Check whether the envelope names a step
    pub fn has_step(&self, step: PipelineStep) -> bool {
        self.pipeline_steps.contains(&step)
    }

    /// Validate ceilings, threshold and step list
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| TierGateError::InvalidEnvelope {
            tier: self.tier_label.clone(),
            reason: reason.to_string(),
        };

        if self.max_messages == 0 {
            return Err(invalid("max_messages must be greater than 0"));
        }
        if !self.max_cost.is_finite() || self.max_cost <= 0.0 {
            return Err(invalid("max_cost must be a positive number"));
        }
        if self.max_duration_secs == 0 {
            return Err(invalid("max_duration_secs must be greater than 0"));
        }
        if !(self.warning_threshold > 0.0 && self.warning_threshold <= 1.0) {
            return Err(invalid("warning_threshold must be in (0, 1]"));
        }
        if self.pipeline_steps.is_empty() {
            return Err(invalid("pipeline_steps must not be empty"));
        }
        for (i, step) in self.pipeline_steps.iter().enumerate() {
            if self.pipeline_steps[..i].contains(step) {
                return Err(invalid(&format!("step '{}' listed twice", step)));
            }
        }

        Ok(())
    }
}

/// Metrics derived from one task during assessment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    /// Acceptance criteria count, never below 1
    pub criteria_count: usize,

    /// Story-point estimate if one was found
    pub story_points: Option<u32>,

    /// Technical keywords present
    pub has_technical_requirements: bool,

    /// UI keywords present
    pub has_ui_requirements: bool,

    /// Integration keywords present
    pub has_integration_requirements: bool,

    /// Distinct implementation-artifact nouns, never below 1
    pub estimated_files: usize,

    /// Weighted composite score, two decimals. Reported only; routing uses
    /// `criteria_count`.
    pub score: f64,
}

/// Full output of `ComplexityAssessor::analyze`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplexityAnalysis {
    pub tier: ComplexityTier,
    pub metrics: ComplexityMetrics,
    pub envelope: ResourceEnvelope,
    pub recommendation: String,
}
