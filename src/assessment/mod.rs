//! Complexity assessment
//!
//! Classifies a task into a tier and resolves the resource envelope and
//! pipeline that tier allows.

pub mod types;
pub mod tiers;
pub mod complexity;

pub use types::{
    ComplexityAnalysis, ComplexityMetrics, ComplexityTier, PipelineStep, ResourceEnvelope,
    DEFAULT_WARNING_THRESHOLD,
};
pub use tiers::TierTable;
pub use complexity::ComplexityAssessor;
