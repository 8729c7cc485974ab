//! Cycle metrics
//!
//! The run loop reports every terminal pick/place outcome and every collision
//! through [`MetricsSink`]. [`MetricsCollector`] is the stock sink: counters,
//! the ordered operation history, per-cycle reports and a history of reports
//! across cycles.

use serde::{Deserialize, Serialize};

use crate::sim::state::OperationResult;
use crate::sim::tick::{CycleSummary, CycleTermination};

/// Receiver for operation outcomes
pub trait MetricsSink {
    /// Terminal pick outcome; `missed` when retries ran out on grasps
    fn record_pick(&mut self, success: bool, missed: bool);

    /// Terminal place outcome
    fn record_place(&mut self, success: bool, correct_zone: bool);

    /// One per detected collision, resolved or not
    fn record_collision(&mut self);

    /// Full result of a terminal operation, in order
    fn record_operation(&mut self, result: &OperationResult);

    /// Clear per-cycle state
    fn reset(&mut self) {}
}

/// Metrics for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub total_objects: usize,
    pub successful_operations: u32,
    pub failed_operations: u32,
    /// Percent of operations that succeeded
    pub success_rate: f64,
    /// Percent of placements that went to the correct zone
    pub accuracy: f64,
    /// Simulated seconds
    pub total_time: f64,
    pub collisions: u32,
    pub missed_picks: u32,
    pub operations_per_second: f64,
    pub cycle_complete: bool,
    pub successful_picks: u32,
    pub failed_picks: u32,
    pub successful_places: u32,
    pub failed_places: u32,
    pub correct_placements: u32,
    pub incorrect_placements: u32,
}

impl MetricsReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Change from the previous cycle's report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportComparison {
    pub success_rate_delta: f64,
    pub accuracy_delta: f64,
    pub total_time_delta: f64,
    pub operations_per_second_delta: f64,
    pub collisions_delta: i64,
    pub missed_picks_delta: i64,
    pub previous_success_rate: f64,
    pub previous_accuracy: f64,
    pub current_success_rate: f64,
    pub current_accuracy: f64,
}

/// Means over every report in the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub success_rate: f64,
    pub accuracy: f64,
    pub total_time: f64,
    pub operations_per_second: f64,
    pub collisions: f64,
    pub missed_picks: f64,
    pub total_cycles: usize,
}

fn percent(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        f64::from(part) / f64::from(whole) * 100.0
    }
}

/// Counting metrics sink with report history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsCollector {
    pub successful_picks: u32,
    pub failed_picks: u32,
    pub successful_places: u32,
    pub failed_places: u32,
    pub collisions: u32,
    pub missed_picks: u32,
    pub correct_placements: u32,
    pub incorrect_placements: u32,
    /// Terminal results of the current cycle, in order
    operations: Vec<OperationResult>,
    /// Reports of past cycles, oldest first
    history: Vec<MetricsReport>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered terminal results of the current cycle
    pub fn operations(&self) -> &[OperationResult] {
        &self.operations
    }

    pub fn successful_operations(&self) -> u32 {
        self.successful_picks + self.successful_places
    }

    pub fn failed_operations(&self) -> u32 {
        self.failed_picks + self.failed_places
    }

    /// Build the report for the cycle described by `summary`
    pub fn report(&self, total_objects: usize, summary: &CycleSummary) -> MetricsReport {
        let successful = self.successful_operations();
        let failed = self.failed_operations();
        let total = successful + failed;
        let placements = self.correct_placements + self.incorrect_placements;
        let operations_per_second = if summary.elapsed > 0.0 {
            f64::from(total) / summary.elapsed
        } else {
            0.0
        };

        MetricsReport {
            total_objects,
            successful_operations: successful,
            failed_operations: failed,
            success_rate: percent(successful, total),
            accuracy: percent(self.correct_placements, placements),
            total_time: summary.elapsed,
            collisions: self.collisions,
            missed_picks: self.missed_picks,
            operations_per_second,
            cycle_complete: summary.termination == CycleTermination::Completed,
            successful_picks: self.successful_picks,
            failed_picks: self.failed_picks,
            successful_places: self.successful_places,
            failed_places: self.failed_places,
            correct_placements: self.correct_placements,
            incorrect_placements: self.incorrect_placements,
        }
    }

    pub fn save_to_history(&mut self, report: MetricsReport) {
        self.history.push(report);
    }

    pub fn history(&self) -> &[MetricsReport] {
        &self.history
    }

    pub fn history_count(&self) -> usize {
        self.history.len()
    }

    pub fn latest_report(&self) -> Option<&MetricsReport> {
        self.history.last()
    }

    /// Deltas of `current` against the most recent saved report
    pub fn compare_with_previous(&self, current: &MetricsReport) -> Option<ReportComparison> {
        let previous = self.history.last()?;
        Some(ReportComparison {
            success_rate_delta: current.success_rate - previous.success_rate,
            accuracy_delta: current.accuracy - previous.accuracy,
            total_time_delta: current.total_time - previous.total_time,
            operations_per_second_delta: current.operations_per_second - previous.operations_per_second,
            collisions_delta: i64::from(current.collisions) - i64::from(previous.collisions),
            missed_picks_delta: i64::from(current.missed_picks) - i64::from(previous.missed_picks),
            previous_success_rate: previous.success_rate,
            previous_accuracy: previous.accuracy,
            current_success_rate: current.success_rate,
            current_accuracy: current.accuracy,
        })
    }

    pub fn average_metrics(&self) -> Option<AverageMetrics> {
        if self.history.is_empty() {
            return None;
        }
        let count = self.history.len();
        let mean = |f: fn(&MetricsReport) -> f64| self.history.iter().map(f).sum::<f64>() / count as f64;
        Some(AverageMetrics {
            success_rate: mean(|r| r.success_rate),
            accuracy: mean(|r| r.accuracy),
            total_time: mean(|r| r.total_time),
            operations_per_second: mean(|r| r.operations_per_second),
            collisions: mean(|r| f64::from(r.collisions)),
            missed_picks: mean(|r| f64::from(r.missed_picks)),
            total_cycles: count,
        })
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Every saved report as a JSON array
    pub fn history_to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.history)
    }
}

impl MetricsSink for MetricsCollector {
    fn record_pick(&mut self, success: bool, missed: bool) {
        if success {
            self.successful_picks += 1;
        } else {
            self.failed_picks += 1;
            if missed {
                self.missed_picks += 1;
            }
        }
    }

    fn record_place(&mut self, success: bool, correct_zone: bool) {
        if !success {
            self.failed_places += 1;
            return;
        }
        self.successful_places += 1;
        if correct_zone {
            self.correct_placements += 1;
        } else {
            self.incorrect_placements += 1;
        }
    }

    fn record_collision(&mut self) {
        self.collisions += 1;
    }

    fn record_operation(&mut self, result: &OperationResult) {
        self.operations.push(result.clone());
    }

    /// Counters and operation history go; report history stays
    fn reset(&mut self) {
        *self = Self {
            history: std::mem::take(&mut self.history),
            ..Self::default()
        };
    }
}
