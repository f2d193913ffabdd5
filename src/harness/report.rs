//! What a run observed.

use core::fmt;

use num_traits::Saturating;
use serde::Serialize;

use crate::concurrency::atomic::AtomicInteger;

/// Final values of one run.
///
/// `atomic_observed == expected` holds for every report the harness returns.
/// `plain_observed` is whatever the race left behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunReport<T> {
    /// `thread_count * loop_count`.
    pub expected: T,
    /// Final value of the plain counter.
    pub plain_observed: T,
    /// Final value of the atomic cell.
    pub atomic_observed: T,
    /// Failed store-conditionals across the atomic group; zero for native increments.
    pub atomic_retries: u64,
}

impl<T: AtomicInteger> RunReport<T> {
    /// Whether the plain counter lost at least one increment.
    pub fn plain_raced(&self) -> bool {
        self.plain_observed != self.expected
    }

    /// Increments the plain counter lost.
    pub fn lost_updates(&self) -> T {
        Saturating::saturating_sub(self.expected, self.plain_observed)
    }
}

impl<T: fmt::Display> fmt::Display for RunReport<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "expected: {}", self.expected)?;
        writeln!(f, "plain_observed: {}", self.plain_observed)?;
        write!(f, "atomic_observed: {}", self.atomic_observed)
    }
}

/// Aggregate of repeated runs with one configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TrialSummary<T> {
    /// Runs performed.
    pub trials: usize,
    /// Runs in which the plain counter lost updates.
    pub raced_trials: usize,
    /// Largest number of lost updates seen in one run.
    pub max_lost_updates: T,
    /// Runs whose atomic total missed `expected`. Always zero for a correct cell.
    pub atomic_mismatches: usize,
    /// Failed store-conditionals across all runs.
    pub atomic_retries: u64,
    /// The final run.
    pub last: RunReport<T>,
}

impl<T: AtomicInteger> TrialSummary<T> {
    pub(crate) fn first(report: RunReport<T>) -> Self {
        Self {
            trials: 1,
            raced_trials: usize::from(report.plain_raced()),
            max_lost_updates: report.lost_updates(),
            atomic_mismatches: usize::from(report.atomic_observed != report.expected),
            atomic_retries: report.atomic_retries,
            last: report,
        }
    }

    pub(crate) fn record(&mut self, report: RunReport<T>) {
        self.trials += 1;
        self.raced_trials += usize::from(report.plain_raced());
        self.max_lost_updates = self.max_lost_updates.max(report.lost_updates());
        self.atomic_mismatches += usize::from(report.atomic_observed != report.expected);
        self.atomic_retries = self.atomic_retries.saturating_add(report.atomic_retries);
        self.last = report;
    }
}

impl<T: fmt::Display> fmt::Display for TrialSummary<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "trials: {}", self.trials)?;
        writeln!(f, "raced_trials: {}", self.raced_trials)?;
        writeln!(f, "max_lost_updates: {}", self.max_lost_updates)?;
        write!(f, "{}", self.last)
    }
}
