//! JSON-file run history: one pretty-printed file per run

use crate::analysis::EfficiencyReport;
use crate::errors::{Result, TierGateError};
use crate::history::RunRepository;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const FILE_PREFIX: &str = "run_";
const FILE_SUFFIX: &str = ".json";

/// History storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Directory holding one file per run
    pub dir: PathBuf,

    /// Maximum reports to keep; oldest are pruned first
    pub max_reports: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        let dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".tiergate")
            .join("history");

        Self {
            dir,
            max_reports: 100,
        }
    }
}

/// Repository writing reports under a directory
#[derive(Debug, Clone)]
pub struct JsonFileRunRepository {
    config: HistoryConfig,
}

fn history_error(action: &str, path: &Path, err: impl std::fmt::Display) -> TierGateError {
    TierGateError::HistoryError(format!("Failed to {} {}: {}", action, path.display(), err))
}

impl JsonFileRunRepository {
    /// Create the repository, creating its directory if needed
    pub fn new(config: HistoryConfig) -> Result<Self> {
        if !config.dir.exists() {
            fs::create_dir_all(&config.dir)
                .map_err(|e| history_error("create history directory", &config.dir, e))?;
        }

        Ok(Self { config })
    }

    /// Repository at `dir` keeping at most `max_reports`
    pub fn open(dir: impl Into<PathBuf>, max_reports: usize) -> Result<Self> {
        Self::new(HistoryConfig {
            dir: dir.into(),
            max_reports,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    fn report_path(&self, run_id: &str) -> PathBuf {
        self.config
            .dir
            .join(format!("{}{}{}", FILE_PREFIX, run_id, FILE_SUFFIX))
    }

    fn report_files(&self) -> Result<Vec<PathBuf>> {
        if !self.config.dir.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.config.dir)
            .map_err(|e| history_error("read history directory", &self.config.dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_report = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(|name| name.starts_with(FILE_PREFIX) && name.ends_with(FILE_SUFFIX))
                .unwrap_or(false);
            if path.is_file() && is_report {
                files.push(path);
            }
        }

        Ok(files)
    }

    fn load(path: &Path) -> Result<EfficiencyReport> {
        let json = fs::read_to_string(path).map_err(|e| history_error("read", path, e))?;
        serde_json::from_str(&json).map_err(|e| history_error("deserialize", path, e))
    }

    /// Delete the oldest reports beyond `max_reports`
    fn prune(&self) -> Result<()> {
        let reports = self.list()?;
        if reports.len() <= self.config.max_reports {
            return Ok(());
        }

        let excess = reports.len() - self.config.max_reports;
        for report in reports.iter().take(excess) {
            let path = self.report_path(&report.run_id.to_string());
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "failed to prune report");
            }
        }
        debug!(pruned = excess, "history pruned");

        Ok(())
    }
}

impl RunRepository for JsonFileRunRepository {
    fn save(&self, report: &EfficiencyReport) -> Result<()> {
        let path = self.report_path(&report.run_id.to_string());
        let json = serde_json::to_string_pretty(report)?;
        fs::write(&path, json).map_err(|e| history_error("write", &path, e))?;

        self.prune()
    }

    fn list(&self) -> Result<Vec<EfficiencyReport>> {
        let mut reports = Vec::new();
        for path in self.report_files()? {
            match Self::load(&path) {
                Ok(report) => reports.push(report),
                Err(e) => warn!(error = %e, "skipping unreadable report"),
            }
        }

        reports.sort_by(|a, b| a.analyzed_at.cmp(&b.analyzed_at));
        Ok(reports)
    }

    fn clear(&self) -> Result<()> {
        for path in self.report_files()? {
            fs::remove_file(&path).map_err(|e| history_error("delete", &path, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::Grade;
    use crate::assessment::ComplexityTier;
    use crate::types::ExecutionStatus;
    use chrono::{Duration, Utc};
    use tempfile::TempDir;
    use uuid::Uuid;

    fn report(age_secs: i64) -> EfficiencyReport {
        EfficiencyReport {
            run_id: Uuid::new_v4(),
            tier: ComplexityTier::Medium,
            status: ExecutionStatus::Completed,
            total_cost: 1.8,
            cost_utilization: 0.6,
            message_utilization: 0.48,
            time_utilization: 0.0,
            efficiency_score: 0.556,
            grade: Grade::Good,
            findings: Vec::new(),
            analyzed_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[test]
    fn test_save_and_list() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonFileRunRepository::open(temp_dir.path(), 10).unwrap();

        let saved = report(0);
        repository.save(&saved).unwrap();

        let reports = repository.list().unwrap();
        assert_eq!(reports, vec![saved.clone()]);
        assert!(temp_dir
            .path()
            .join(format!("run_{}.json", saved.run_id))
            .exists());
    }

    #[test]
    fn test_prunes_oldest() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonFileRunRepository::open(temp_dir.path(), 2).unwrap();

        let oldest = report(30);
        repository.save(&oldest).unwrap();
        repository.save(&report(20)).unwrap();
        repository.save(&report(10)).unwrap();

        let reports = repository.list().unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.run_id != oldest.run_id));
    }

    #[test]
    fn test_skips_unreadable_files() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonFileRunRepository::open(temp_dir.path(), 10).unwrap();
        fs::write(temp_dir.path().join("run_broken.json"), "{not json").unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

        repository.save(&report(0)).unwrap();
        assert_eq!(repository.list().unwrap().len(), 1);
    }

    #[test]
    fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let repository = JsonFileRunRepository::open(temp_dir.path(), 10).unwrap();
        repository.save(&report(0)).unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "kept").unwrap();

        repository.clear().unwrap();
        assert!(repository.list().unwrap().is_empty());
        assert!(temp_dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("a").join("b");
        let repository = JsonFileRunRepository::open(&nested, 10).unwrap();
        assert!(repository.dir().exists());
    }
}
