//! Analysis system type definitions

use crate::assessment::ComplexityTier;
use crate::types::ExecutionStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Letter-style grade for an efficiency score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl Grade {
    /// ≥0.75 Excellent, ≥0.5 Good, ≥0.25 Fair, else Poor
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            Grade::Excellent
        } else if score >= 0.5 {
            Grade::Good
        } else if score >= 0.25 {
            Grade::Fair
        } else {
            Grade::Poor
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Grade::Poor => "poor",
            Grade::Fair => "fair",
            Grade::Good => "good",
            Grade::Excellent => "excellent",
        };
        f.write_str(name)
    }
}

/// What a finding is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    CostOverrun,
    MessageOverrun,
    TimeOverrun,
    NearLimit,
    EarlyTermination,
    StepFailure,
    /// Heavier pipeline than the work needed
    Overprovisioned,
    SkippedSteps,
}

/// One observation about a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: FindingKind,
    pub message: String,
}

impl Finding {
    pub fn new(kind: FindingKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Post-hoc efficiency report for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyReport {
    pub run_id: Uuid,
    pub tier: ComplexityTier,
    pub status: ExecutionStatus,
    pub total_cost: f64,

    /// Consumed / ceiling. Above 1.0 means the ceiling was overrun.
    pub cost_utilization: f64,
    pub message_utilization: f64,
    pub time_utilization: f64,

    /// 0.0 to 1.0, higher is better
    pub efficiency_score: f64,
    pub grade: Grade,
    pub findings: Vec<Finding>,
    pub analyzed_at: DateTime<Utc>,
}

impl EfficiencyReport {
    pub fn has_finding(&self, kind: FindingKind) -> bool {
        self.findings.iter().any(|finding| finding.kind == kind)
    }
}

/// Aggregate statistics over stored reports
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyStats {
    pub total_runs: usize,
    pub completed: usize,
    pub terminated: usize,
    pub failed: usize,

    /// Mean efficiency score, 0.0 when there are no runs
    pub average_efficiency: f64,
    pub total_cost: f64,
    pub runs_by_tier: BTreeMap<ComplexityTier, usize>,
}

impl EfficiencyStats {
    /// Aggregate a set of reports
    pub fn from_reports(reports: &[EfficiencyReport]) -> Self {
        let mut stats = Self {
            total_runs: reports.len(),
            ..Self::default()
        };

        let mut efficiency_sum = 0.0;
        for report in reports {
            match report.status {
                ExecutionStatus::Completed => stats.completed += 1,
                ExecutionStatus::Terminated => stats.terminated += 1,
                ExecutionStatus::Failed => stats.failed += 1,
            }
            efficiency_sum += report.efficiency_score;
            stats.total_cost += report.total_cost;
            *stats.runs_by_tier.entry(report.tier).or_insert(0) += 1;
        }

        if !reports.is_empty() {
            stats.average_efficiency = efficiency_sum / reports.len() as f64;
        }

        stats
    }

    /// Fraction of runs that completed
    pub fn completion_rate(&self) -> f64 {
        if self.total_runs == 0 {
            0.0
        } else {
            self.completed as f64 / self.total_runs as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_boundaries() {
        assert_eq!(Grade::from_score(1.0), Grade::Excellent);
        assert_eq!(Grade::from_score(0.75), Grade::Excellent);
        assert_eq!(Grade::from_score(0.749), Grade::Good);
        assert_eq!(Grade::from_score(0.5), Grade::Good);
        assert_eq!(Grade::from_score(0.25), Grade::Fair);
        assert_eq!(Grade::from_score(0.1), Grade::Poor);
        assert!(Grade::Excellent > Grade::Poor);
    }

    #[test]
    fn test_empty_stats() {
        let stats = EfficiencyStats::from_reports(&[]);
        assert_eq!(stats.total_runs, 0);
        assert_eq!(stats.average_efficiency, 0.0);
        assert_eq!(stats.completion_rate(), 0.0);
    }
}
