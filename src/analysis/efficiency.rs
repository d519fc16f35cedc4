//! Efficiency analyzer
//!
//! Read-only consumer of `ExecutionResult`. Grades how far under its
//! envelope a run finished and flags the patterns worth a second look:
//! overruns, near-limit runs, early termination, failures and runs whose
//! tier was heavier than the work turned out to be.
//!
//! Reports go to an injected `RunRepository`; the analyzer keeps no
//! history of its own.

use crate::analysis::types::{EfficiencyReport, EfficiencyStats, Finding, FindingKind, Grade};
use crate::assessment::{ComplexityTier, ResourceEnvelope};
use crate::errors::Result;
use crate::history::{InMemoryRunRepository, RunRepository};
use crate::types::{ExecutionResult, ExecutionStatus};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

/// Cost utilization below which a non-simple run is flagged as overprovisioned
pub const OVERPROVISION_RATIO: f64 = 0.25;

/// Efficiency analyzer backed by a run repository
#[derive(Clone)]
pub struct EfficiencyAnalyzer {
    repository: Arc<dyn RunRepository>,
}

impl EfficiencyAnalyzer {
    /// Create an analyzer storing reports in `repository`
    pub fn new(repository: Arc<dyn RunRepository>) -> Self {
        Self { repository }
    }

    /// Analyzer with a fresh in-memory repository
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryRunRepository::new()))
    }

    pub fn repository(&self) -> &Arc<dyn RunRepository> {
        &self.repository
    }

    /// Build a report for one run. Does not persist it.
    pub fn analyze(&self, result: &ExecutionResult, envelope: &ResourceEnvelope) -> EfficiencyReport {
        let cost_utilization = ratio(result.total_cost, envelope.max_cost);
        let message_utilization =
            ratio(result.total_messages as f64, f64::from(envelope.max_messages));
        let time_utilization = ratio(result.duration_secs, envelope.max_duration_secs as f64);

        let efficiency_score = result.budget.efficiency_score.clamp(0.0, 1.0);
        let grade = Grade::from_score(efficiency_score);

        let mut findings = Vec::new();

        let overruns = [
            (FindingKind::CostOverrun, "cost", cost_utilization),
            (FindingKind::MessageOverrun, "message", message_utilization),
            (FindingKind::TimeOverrun, "time", time_utilization),
        ];
        for (kind, dimension, utilization) in overruns {
            if utilization > 1.0 {
                findings.push(Finding::new(
                    kind,
                    format!("{} ceiling overrun: {:.0}% of budget used", dimension, utilization * 100.0),
                ));
            }
        }

        if findings.is_empty() {
            let peak = cost_utilization.max(message_utilization).max(time_utilization);
            if peak >= envelope.warning_threshold {
                findings.push(Finding::new(
                    FindingKind::NearLimit,
                    format!(
                        "finished at {:.0}% of the tightest ceiling (warning at {:.0}%)",
                        peak * 100.0,
                        envelope.warning_threshold * 100.0
                    ),
                ));
            }
        }

        match result.status {
            ExecutionStatus::Terminated => {
                let detail = result
                    .termination_reason
                    .as_ref()
                    .map(|reason| reason.to_string())
                    .unwrap_or_else(|| "budget exceeded".to_string());
                findings.push(Finding::new(FindingKind::EarlyTermination, detail));
            }
            ExecutionStatus::Failed => {
                let step = result
                    .failed_step
                    .map(|step| step.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                let error = result.error.as_deref().unwrap_or("no error recorded");
                findings.push(Finding::new(
                    FindingKind::StepFailure,
                    format!("step '{}' failed: {}", step, error),
                ));
            }
            ExecutionStatus::Completed => {
                if result.tier != ComplexityTier::Simple && cost_utilization < OVERPROVISION_RATIO {
                    findings.push(Finding::new(
                        FindingKind::Overprovisioned,
                        format!(
                            "{} pipeline used {:.0}% of its cost envelope; a lighter tier may fit",
                            result.tier,
                            cost_utilization * 100.0
                        ),
                    ));
                }
            }
        }

        if !result.skipped_steps.is_empty() {
            let skipped: Vec<&str> = result.skipped_steps.iter().map(|step| step.id()).collect();
            findings.push(Finding::new(
                FindingKind::SkippedSteps,
                format!("skipped: {}", skipped.join(", ")),
            ));
        }

        debug!(
            run_id = %result.run_id,
            efficiency_score,
            grade = %grade,
            findings = findings.len(),
            "run analyzed"
        );

        EfficiencyReport {
            run_id: result.run_id,
            tier: result.tier,
            status: result.status,
            total_cost: result.total_cost,
            cost_utilization,
            message_utilization,
            time_utilization,
            efficiency_score,
            grade,
            findings,
            analyzed_at: Utc::now(),
        }
    }

    /// Analyze a run and store the report
    pub fn record(
        &self,
        result: &ExecutionResult,
        envelope: &ResourceEnvelope,
    ) -> Result<EfficiencyReport> {
        let report = self.analyze(result, envelope);
        self.repository.save(&report)?;
        info!(run_id = %report.run_id, grade = %report.grade, "efficiency report stored");
        Ok(report)
    }

    /// All stored reports, oldest first
    pub fn history(&self) -> Result<Vec<EfficiencyReport>> {
        self.repository.list()
    }

    /// Aggregate statistics over stored reports
    pub fn aggregate(&self) -> Result<EfficiencyStats> {
        Ok(EfficiencyStats::from_reports(&self.repository.list()?))
    }

    /// Remove every stored report
    pub fn clear_history(&self) -> Result<()> {
        self.repository.clear()
    }
}

impl Default for EfficiencyAnalyzer {
    fn default() -> Self {
        Self::in_memory()
    }
}

fn ratio(value: f64, ceiling: f64) -> f64 {
    if ceiling > 0.0 {
        (value / ceiling).max(0.0)
    } else {
        0.0
    }
}
