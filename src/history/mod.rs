//! Run history storage
//!
//! Efficiency reports are kept behind the `RunRepository` trait so that
//! callers choose the store and concurrent runs never share hidden state.

pub mod memory;
pub mod persistence;

pub use memory::InMemoryRunRepository;
pub use persistence::{HistoryConfig, JsonFileRunRepository};

use crate::analysis::EfficiencyReport;
use crate::errors::Result;

/// Store of efficiency reports
pub trait RunRepository: Send + Sync {
    /// Store a report. Saving the same run id twice replaces the first copy.
    fn save(&self, report: &EfficiencyReport) -> Result<()>;

    /// All stored reports, oldest first
    fn list(&self) -> Result<Vec<EfficiencyReport>>;

    /// Remove every stored report
    fn clear(&self) -> Result<()>;
}
