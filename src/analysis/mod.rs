//! Post-hoc efficiency analysis
//! Grades finished runs against their envelopes and aggregates stored reports

pub mod efficiency;
pub mod types;

pub use efficiency::{EfficiencyAnalyzer, OVERPROVISION_RATIO};
pub use types::{EfficiencyReport, EfficiencyStats, Finding, FindingKind, Grade};
