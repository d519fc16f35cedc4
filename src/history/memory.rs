//! In-memory run history, scoped to the process

use crate::analysis::EfficiencyReport;
use crate::errors::{Result, TierGateError};
use crate::history::RunRepository;
use std::sync::{Mutex, MutexGuard};

/// Process-local repository
#[derive(Debug, Default)]
pub struct InMemoryRunRepository {
    reports: Mutex<Vec<EfficiencyReport>>,
}

impl InMemoryRunRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn reports(&self) -> Result<MutexGuard<'_, Vec<EfficiencyReport>>> {
        self.reports
            .lock()
            .map_err(|_| TierGateError::HistoryError("report store lock poisoned".to_string()))
    }
}

impl RunRepository for InMemoryRunRepository {
    fn save(&self, report: &EfficiencyReport) -> Result<()> {
        let mut reports = self.reports()?;
        reports.retain(|existing| existing.run_id != report.run_id);
        reports.push(report.clone());
        Ok(())
    }

    fn list(&self) -> Result<Vec<EfficiencyReport>> {
        let mut reports = self.reports()?.clone();
        reports.sort_by(|a, b| a.analyzed_at.cmp(&b.analyzed_at));
        Ok(reports)
    }

    fn clear(&self) -> Result<()> {
        self.reports()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{EfficiencyReport, Grade};
    use crate::assessment::ComplexityTier;
    use crate::types::ExecutionStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn report() -> EfficiencyReport {
        EfficiencyReport {
            run_id: Uuid::new_v4(),
            tier: ComplexityTier::Simple,
            status: ExecutionStatus::Completed,
            total_cost: 0.6,
            cost_utilization: 0.6,
            message_utilization: 0.5,
            time_utilization: 0.0,
            efficiency_score: 0.55,
            grade: Grade::Good,
            findings: Vec::new(),
            analyzed_at: Utc::now(),
        }
    }

    #[test]
    fn test_save_list_clear() {
        let repository = InMemoryRunRepository::new();
        repository.save(&report()).unwrap();
        repository.save(&report()).unwrap();
        assert_eq!(repository.list().unwrap().len(), 2);

        repository.clear().unwrap();
        assert!(repository.list().unwrap().is_empty());
    }

    #[test]
    fn test_save_replaces_same_run() {
        let repository = InMemoryRunRepository::new();
        let mut first = report();
        repository.save(&first).unwrap();
        first.grade = Grade::Excellent;
        repository.save(&first).unwrap();

        let reports = repository.list().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].grade, Grade::Excellent);
    }
}
