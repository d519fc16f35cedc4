//! Real-time budget monitor
//! Tracks consumption of one run against its resource envelope

use crate::assessment::ResourceEnvelope;
use crate::budget::types::{BudgetObserver, BudgetStatus, BudgetSummary, ConsumptionEntry};
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Ledger of consumption for a single run.
///
/// Guarantees:
/// - Monotonicity: totals never decrease, entries are never retracted
/// - Strictness: landing exactly on a ceiling does not terminate
/// - Purity: `peek_status` never mutates the ledger
pub struct BudgetMonitor {
    /// Ceilings for this run
    envelope: ResourceEnvelope,

    /// Append-only ledger
    entries: Vec<ConsumptionEntry>,

    total_cost: f64,
    total_messages: u64,
    total_tokens: u64,
    cost_by_step: BTreeMap<String, f64>,

    /// Run start time
    start_time: Instant,

    /// Observers in registration order
    observers: Vec<Arc<dyn BudgetObserver>>,

    /// Status after the last recorded entry, for transition logging only
    last_status: BudgetStatus,
}

impl BudgetMonitor {
    /// Create a monitor whose clock starts now
    pub fn new(envelope: ResourceEnvelope) -> Self {
        Self::with_start(envelope, Instant::now())
    }

    /// Create a monitor whose clock started at `start_time`
    pub fn with_start(envelope: ResourceEnvelope, start_time: Instant) -> Self {
        Self {
            envelope,
            entries: Vec::new(),
            total_cost: 0.0,
            total_messages: 0,
            total_tokens: 0,
            cost_by_step: BTreeMap::new(),
            start_time,
            observers: Vec::new(),
            last_status: BudgetStatus::WithinBudget,
        }
    }

    /// Register an observer
    pub fn register_observer(&mut self, observer: Arc<dyn BudgetObserver>) {
        self.observers.push(observer);
    }

    /// Register an observer by value
    pub fn add_observer<O: BudgetObserver + 'static>(&mut self, observer: O) {
        self.register_observer(Arc::new(observer));
    }

    /// Record one consumption event and return the resulting status.
    ///
    /// Negative or non-finite costs are recorded as zero so totals stay
    /// monotonic. Observers are notified once per call whenever the result
    /// is anything but `WithinBudget`.
    pub fn record_consumption(
        &mut self,
        step_id: &str,
        cost: f64,
        message_delta: u32,
        token_count: u64,
        metadata: Value,
    ) -> BudgetStatus {
        let cost = if cost.is_finite() && cost >= 0.0 {
            cost
        } else {
            warn!(step = step_id, cost, "ignoring invalid cost, recording 0.0");
            0.0
        };

        self.entries.push(ConsumptionEntry {
            timestamp: Utc::now(),
            step_id: step_id.to_string(),
            cost,
            message_delta,
            token_count,
            metadata,
        });

        self.total_cost += cost;
        self.total_messages += u64::from(message_delta);
        self.total_tokens += token_count;
        *self.cost_by_step.entry(step_id.to_string()).or_insert(0.0) += cost;

        let status = self.status();
        debug!(
            step = step_id,
            cost,
            total_cost = self.total_cost,
            total_messages = self.total_messages,
            status = %status,
            "consumption recorded"
        );

        let previous = self.last_status;
        if status != previous {
            if status.is_exceeded() {
                warn!(from = %previous, to = %status, "budget ceiling exceeded");
            } else {
                info!(from = %previous, to = %status, "budget status changed");
            }
            self.last_status = status;
        }

        if status != BudgetStatus::WithinBudget {
            self.notify(status);
        }

        status
    }

    /// Record a cost with one message, no tokens and no metadata
    pub fn record_cost(&mut self, step_id: &str, cost: f64) -> BudgetStatus {
        self.record_consumption(step_id, cost, 1, 0, Value::Null)
    }

    /// Status if one more entry costing `projected_cost` (one message) were
    /// recorded now. Does not touch the ledger.
    pub fn peek_status(&self, projected_cost: f64) -> BudgetStatus {
        let projected_cost = if projected_cost.is_finite() {
            projected_cost.max(0.0)
        } else {
            0.0
        };

        classify(
            &self.envelope,
            self.total_cost + projected_cost,
            self.total_messages + 1,
            self.elapsed(),
        )
    }

    /// Current status
    pub fn status(&self) -> BudgetStatus {
        classify(
            &self.envelope,
            self.total_cost,
            self.total_messages,
            self.elapsed(),
        )
    }

    /// True once any total strictly exceeds its ceiling
    pub fn must_terminate(&self) -> bool {
        self.status().is_exceeded()
    }

    /// Efficiency score in [0.0, 1.0]
    ///
    /// Formula: 0.5 × (1 - cost_ratio) + 0.3 × (1 - message_ratio)
    ///        + 0.2 × (1 - time_ratio), each term floored at 0.
    /// A monitor with no recorded messages scores 1.0.
    pub fn efficiency_score(&self) -> f64 {
        if self.total_messages == 0 {
            return 1.0;
        }

        let (cost_ratio, message_ratio, time_ratio) = self.ratios();
        let score = 0.5 * (1.0 - cost_ratio).max(0.0)
            + 0.3 * (1.0 - message_ratio).max(0.0)
            + 0.2 * (1.0 - time_ratio).max(0.0);

        score.clamp(0.0, 1.0)
    }

    /// Snapshot of totals, ratios, efficiency and status
    pub fn summary(&self) -> BudgetSummary {
        let (cost_ratio, message_ratio, time_ratio) = self.ratios();

        BudgetSummary {
            total_cost: self.total_cost,
            total_messages: self.total_messages,
            total_tokens: self.total_tokens,
            elapsed_secs: self.elapsed().as_secs_f64(),
            cost_by_step: self.cost_by_step.clone(),
            cost_ratio,
            message_ratio,
            time_ratio,
            efficiency_score: self.efficiency_score(),
            status: self.status(),
        }
    }

    /// Read-only ledger
    pub fn entries(&self) -> &[ConsumptionEntry] {
        &self.entries
    }

    /// Envelope this monitor enforces
    pub fn envelope(&self) -> &ResourceEnvelope {
        &self.envelope
    }

    pub fn total_cost(&self) -> f64 {
        self.total_cost
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Time since the monitor's clock started
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Cost left before the ceiling, never negative
    pub fn remaining_cost(&self) -> f64 {
        (self.envelope.max_cost - self.total_cost).max(0.0)
    }

    /// Messages left before the ceiling
    pub fn remaining_messages(&self) -> u64 {
        u64::from(self.envelope.max_messages).saturating_sub(self.total_messages)
    }

    fn ratios(&self) -> (f64, f64, f64) {
        let cost_ratio = self.total_cost / self.envelope.max_cost;
        let message_ratio = self.total_messages as f64 / f64::from(self.envelope.max_messages);
        let time_ratio = self.elapsed().as_secs_f64() / self.envelope.max_duration_secs as f64;
        (cost_ratio, message_ratio, time_ratio)
    }

    fn notify(&self, status: BudgetStatus) {
        if self.observers.is_empty() {
            return;
        }

        let summary = self.summary();
        for (index, observer) in self.observers.iter().enumerate() {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                observer.on_budget_status_change(status, &summary)
            }));
            if outcome.is_err() {
                error!(observer = index, status = %status, "budget observer panicked");
            }
        }
    }
}

impl std::fmt::Debug for BudgetMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BudgetMonitor")
            .field("tier", &self.envelope.tier_label)
            .field("entries", &self.entries.len())
            .field("total_cost", &self.total_cost)
            .field("total_messages", &self.total_messages)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Classify totals against an envelope.
///
/// Precedence: cost > messages > time > approaching > within.
pub fn classify(
    envelope: &ResourceEnvelope,
    total_cost: f64,
    total_messages: u64,
    elapsed: Duration,
) -> BudgetStatus {
    if total_cost > envelope.max_cost {
        return BudgetStatus::CostExceeded;
    }
    if total_messages > u64::from(envelope.max_messages) {
        return BudgetStatus::MessageLimitExceeded;
    }
    if elapsed > envelope.max_duration() {
        return BudgetStatus::TimeLimitExceeded;
    }

    let cost_ratio = total_cost / envelope.max_cost;
    let message_ratio = total_messages as f64 / f64::from(envelope.max_messages);
    if cost_ratio >= envelope.warning_threshold || message_ratio >= envelope.warning_threshold {
        return BudgetStatus::ApproachingLimit;
    }

    BudgetStatus::WithinBudget
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::ComplexityTier;
    use std::sync::Mutex;

    fn simple() -> ResourceEnvelope {
        ResourceEnvelope::default_for(ComplexityTier::Simple)
    }

    #[test]
    fn test_fresh_monitor() {
        let monitor = BudgetMonitor::new(simple());
        assert_eq!(monitor.status(), BudgetStatus::WithinBudget);
        assert!(!monitor.must_terminate());
        assert_eq!(monitor.efficiency_score(), 1.0);
        assert!(monitor.entries().is_empty());
    }

    #[test]
    fn test_three_events_approach_limit() {
        let mut monitor = BudgetMonitor::new(simple());
        assert_eq!(monitor.record_cost("plan", 0.30), BudgetStatus::WithinBudget);
        assert_eq!(monitor.record_cost("plan", 0.30), BudgetStatus::WithinBudget);
        assert_eq!(monitor.record_cost("plan", 0.30), BudgetStatus::ApproachingLimit);
        assert!((monitor.total_cost() - 0.90).abs() < 1e-9);
        assert!(!monitor.must_terminate());
    }

    #[test]
    fn test_cost_exceeded_terminates() {
        let mut monitor = BudgetMonitor::new(simple().with_max_cost(0.50));
        monitor.record_cost("plan", 0.30);
        let status = monitor.record_cost("backend", 0.30);
        assert_eq!(status, BudgetStatus::CostExceeded);
        assert!(monitor.must_terminate());
        assert!((monitor.summary().total_cost - 0.60).abs() < 1e-9);
    }

    #[test]
    fn test_exact_ceiling_does_not_terminate() {
        let mut monitor = BudgetMonitor::new(simple().with_max_cost(1.0).with_max_messages(2));
        monitor.record_cost("plan", 0.5);
        monitor.record_cost("backend", 0.5);
        assert!(!monitor.must_terminate());
        assert_eq!(monitor.status(), BudgetStatus::ApproachingLimit);

        monitor.record_consumption("frontend", 0.0, 1, 0, Value::Null);
        assert_eq!(monitor.status(), BudgetStatus::MessageLimitExceeded);
    }

    #[test]
    fn test_cost_takes_precedence_over_messages() {
        let mut monitor = BudgetMonitor::new(simple().with_max_cost(0.1).with_max_messages(1));
        let status = monitor.record_consumption("plan", 0.5, 5, 0, Value::Null);
        assert_eq!(status, BudgetStatus::CostExceeded);
    }

    #[test]
    fn test_time_limit() {
        let start = Instant::now() - Duration::from_secs(10);
        let monitor = BudgetMonitor::with_start(simple().with_max_duration_secs(5), start);
        assert_eq!(monitor.status(), BudgetStatus::TimeLimitExceeded);
        assert!(monitor.must_terminate());
    }

    #[test]
    fn test_peek_does_not_mutate() {
        let mut monitor = BudgetMonitor::new(simple());
        monitor.record_cost("plan", 0.5);
        let before = monitor.summary();

        assert_eq!(monitor.peek_status(0.6), BudgetStatus::CostExceeded);
        assert_eq!(monitor.peek_status(0.0), BudgetStatus::WithinBudget);

        let after = monitor.summary();
        assert_eq!(before.total_cost, after.total_cost);
        assert_eq!(before.total_messages, after.total_messages);
        assert_eq!(before.cost_by_step, after.cost_by_step);
        assert_eq!(monitor.entries().len(), 1);
    }

    #[test]
    fn test_efficiency_floors_overrun_terms() {
        let mut monitor = BudgetMonitor::new(simple().with_max_cost(0.1));
        monitor.record_cost("plan", 5.0);
        let score = monitor.efficiency_score();
        // cost term contributes 0; messages 1/20 used; time ~0
        assert!(score >= 0.0 && score <= 0.5 + 1e-9, "got {}", score);
        assert!(score > 0.45);
    }

    #[test]
    fn test_cost_by_step_and_tokens() {
        let mut monitor = BudgetMonitor::new(simple());
        monitor.record_consumption("plan", 0.1, 2, 500, Value::Null);
        monitor.record_consumption("backend", 0.2, 1, 300, Value::Null);
        monitor.record_consumption("plan", 0.1, 1, 0, Value::Null);

        let summary = monitor.summary();
        assert_eq!(summary.total_messages, 4);
        assert_eq!(summary.total_tokens, 800);
        assert!((summary.cost_by_step["plan"] - 0.2).abs() < 1e-9);
        assert!((summary.cost_by_step["backend"] - 0.2).abs() < 1e-9);
        assert_eq!(monitor.remaining_messages(), 16);
    }

    #[test]
    fn test_negative_cost_recorded_as_zero() {
        let mut monitor = BudgetMonitor::new(simple());
        monitor.record_cost("plan", 0.2);
        monitor.record_cost("plan", -5.0);
        assert!((monitor.total_cost() - 0.2).abs() < 1e-9);
        assert_eq!(monitor.entries()[1].cost, 0.0);
    }

    #[test]
    fn test_observers_notified_in_order_once_per_call() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut monitor = BudgetMonitor::new(simple());

        let first = calls.clone();
        monitor.add_observer(move |status: BudgetStatus, _: &BudgetSummary| {
            first.lock().unwrap().push(("first", status));
        });
        let second = calls.clone();
        monitor.add_observer(move |status: BudgetStatus, summary: &BudgetSummary| {
            assert!(summary.total_cost > 0.0);
            second.lock().unwrap().push(("second", status));
        });

        monitor.record_cost("plan", 0.1);
        assert!(calls.lock().unwrap().is_empty());

        monitor.record_cost("plan", 0.8);
        monitor.record_cost("plan", 0.5);

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                ("first", BudgetStatus::ApproachingLimit),
                ("second", BudgetStatus::ApproachingLimit),
                ("first", BudgetStatus::CostExceeded),
                ("second", BudgetStatus::CostExceeded),
            ]
        );
    }

    #[test]
    fn test_panicking_observer_is_contained() {
        let reached = Arc::new(Mutex::new(0));
        let mut monitor = BudgetMonitor::new(simple().with_max_cost(0.1));

        monitor.add_observer(|_: BudgetStatus, _: &BudgetSummary| panic!("observer failure"));
        let counter = reached.clone();
        monitor.add_observer(move |_: BudgetStatus, _: &BudgetSummary| {
            *counter.lock().unwrap() += 1;
        });

        let status = monitor.record_cost("plan", 1.0);
        assert_eq!(status, BudgetStatus::CostExceeded);
        assert_eq!(*reached.lock().unwrap(), 1);
    }
}
