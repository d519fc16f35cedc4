//! Telemetry for orchestrator runs
//!
//! Collects state transitions, step lifecycle events and budget alerts from
//! any number of runs into one shared, clonable stream.

use crate::assessment::PipelineStep;
use crate::budget::{BudgetObserver, BudgetStatus, BudgetSummary};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Telemetry event types
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    StateTransition {
        from: String,
        to: String,
        timestamp: Instant,
    },
    StepStarted {
        step: PipelineStep,
        timestamp: Instant,
    },
    StepCompleted {
        step: PipelineStep,
        duration_ms: u64,
        success: bool,
        cost: f64,
        timestamp: Instant,
    },
    StepSkipped {
        step: PipelineStep,
        timestamp: Instant,
    },
    BudgetAlert {
        status: BudgetStatus,
        total_cost: f64,
        total_messages: u64,
        timestamp: Instant,
    },
    /// Projected status of a step about to run, when not within budget
    BudgetProjection {
        step: PipelineStep,
        projected: BudgetStatus,
        timestamp: Instant,
    },
}

/// Telemetry statistics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryStats {
    pub state_transitions: usize,
    pub steps_started: usize,
    pub steps_succeeded: usize,
    pub steps_failed: usize,
    pub steps_skipped: usize,
    pub budget_alerts: usize,
    pub budget_exceeded: usize,
    pub projected_overruns: usize,
    pub total_step_cost: f64,
}

/// Telemetry collector
#[derive(Clone)]
pub struct TelemetryCollector {
    events: Arc<Mutex<Vec<TelemetryEvent>>>,
    stats: Arc<Mutex<TelemetryStats>>,
    start_time: Instant,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // a panicked recorder leaves plain data behind, keep collecting
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl TelemetryCollector {
    /// Create a new telemetry collector
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(TelemetryStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Record an event
    pub fn record(&self, event: TelemetryEvent) {
        {
            let mut stats = lock(&self.stats);
            match &event {
                TelemetryEvent::StateTransition { .. } => {
                    stats.state_transitions += 1;
                }
                TelemetryEvent::StepStarted { .. } => {
                    stats.steps_started += 1;
                }
                TelemetryEvent::StepCompleted { success, cost, .. } => {
                    if *success {
                        stats.steps_succeeded += 1;
                    } else {
                        stats.steps_failed += 1;
                    }
                    stats.total_step_cost += cost;
                }
                TelemetryEvent::StepSkipped { .. } => {
                    stats.steps_skipped += 1;
                }
                TelemetryEvent::BudgetAlert { status, .. } => {
                    stats.budget_alerts += 1;
                    if status.is_exceeded() {
                        stats.budget_exceeded += 1;
                    }
                }
                TelemetryEvent::BudgetProjection { projected, .. } => {
                    if projected.is_exceeded() {
                        stats.projected_overruns += 1;
                    }
                }
            }
        }

        lock(&self.events).push(event);
    }

    /// Get current statistics
    pub fn get_stats(&self) -> TelemetryStats {
        lock(&self.stats).clone()
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        lock(&self.events).len()
    }

    /// Get all recorded events
    pub fn events(&self) -> Vec<TelemetryEvent> {
        lock(&self.events).clone()
    }

    /// Get recent events (last n)
    pub fn recent_events(&self, n: usize) -> Vec<TelemetryEvent> {
        let events = lock(&self.events);
        let start = events.len().saturating_sub(n);
        events[start..].to_vec()
    }

    /// Fraction of finished steps that succeeded
    pub fn step_success_rate(&self) -> f64 {
        let stats = lock(&self.stats);
        let total = stats.steps_succeeded + stats.steps_failed;
        if total == 0 {
            1.0
        } else {
            stats.steps_succeeded as f64 / total as f64
        }
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl BudgetObserver for TelemetryCollector {
    fn on_budget_status_change(&self, status: BudgetStatus, summary: &BudgetSummary) {
        self.record(TelemetryEvent::BudgetAlert {
            status,
            total_cost: summary.total_cost,
            total_messages: summary.total_messages,
            timestamp: Instant::now(),
        });
    }
}
