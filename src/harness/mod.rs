//! The hidden-update experiment.
//!
//! [`RaceHarness::run`] forks two equally sized groups of workers: one
//! increments a [`PlainCounter`], the other an [`AtomicCell`]. Both groups are
//! released together, joined as one batch, and the final values are reported.
//! The atomic total always matches; the plain total usually does not.

pub mod config;
pub mod report;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use crossbeam_utils::CachePadded;

use crate::concurrency::atomic::{AtomicCell, AtomicInteger};
use crate::concurrency::plain::PlainCounter;
use crate::error::HarnessError;

pub use config::{
    IncrementStrategy, RunConfiguration, DEFAULT_LOOP_COUNT, DEFAULT_RACE_WINDOW,
    DEFAULT_THREAD_COUNT,
};
pub use report::{RunReport, TrialSummary};
pub use worker::WorkerState;

use worker::WorkerBatch;

/// How long [`RaceHarness`] waits for its workers unless told otherwise.
pub const DEFAULT_JOIN_DEADLINE: Duration = Duration::from_secs(60);

/// Where a harness is in its current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessPhase {
    /// Nothing spawned.
    Idle,
    /// Workers exist and have been released.
    WorkersSpawned,
    /// Every worker completed and was joined.
    AllJoined,
    /// A report was produced.
    Reported,
}

/// Runs the plain-versus-atomic experiment.
#[derive(Debug, Clone)]
pub struct RaceHarness {
    deadline: Duration,
    phase: HarnessPhase,
}

impl Default for RaceHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// The two counters under test, each on its own cache line.
struct Counters<T: AtomicInteger> {
    plain: CachePadded<PlainCounter<T>>,
    atomic: CachePadded<AtomicCell<T>>,
}

impl RaceHarness {
    /// A harness with the default join deadline.
    pub fn new() -> Self {
        Self {
            deadline: DEFAULT_JOIN_DEADLINE,
            phase: HarnessPhase::Idle,
        }
    }

    /// Sets how long a run may wait for its workers before failing with
    /// [`HarnessError::Timeout`].
    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// The configured join deadline.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Phase reached by the most recent run.
    pub fn phase(&self) -> HarnessPhase {
        self.phase
    }

    fn enter(&mut self, phase: HarnessPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "harness phase");
        self.phase = phase;
    }

    /// Runs one experiment.
    ///
    /// The configuration is checked before anything is spawned; a rejected
    /// configuration leaves the harness `Idle`.
    pub fn run<T: AtomicInteger>(
        &mut self,
        config: &RunConfiguration,
    ) -> Result<RunReport<T>, HarnessError> {
        self.phase = HarnessPhase::Idle;
        let expected = config.expected::<T>()?;
        let workers = config.total_workers()?;
        tracing::info!(%config, bits = T::BITS, "starting run");

        let counters = Arc::new(Counters::<T> {
            plain: CachePadded::new(PlainCounter::new(T::zero())),
            atomic: CachePadded::new(AtomicCell::new(T::zero())),
        });
        let job = {
            let counters = Arc::clone(&counters);
            let config = *config;
            move |worker: usize| {
                if worker < config.thread_count {
                    plain_worker(&counters.plain, &config);
                    0
                } else {
                    atomic_worker(&counters.atomic, &config)
                }
            }
        };

        let batch = WorkerBatch::spawn("tally-worker", workers, job)?;
        self.enter(HarnessPhase::WorkersSpawned);
        tracing::debug!(workers = batch.len(), "workers released");

        let outputs = batch.join(self.deadline)?;
        self.enter(HarnessPhase::AllJoined);

        let report = RunReport {
            expected,
            plain_observed: counters.plain.load(),
            atomic_observed: counters.atomic.load(),
            atomic_retries: outputs.iter().fold(0u64, |sum, &n| sum.saturating_add(n)),
        };
        debug_assert_eq!(report.atomic_observed, report.expected);

        if report.plain_raced() {
            tracing::info!(lost = %report.lost_updates(), "plain counter lost updates");
        }
        tracing::info!(
            expected = %report.expected,
            plain_observed = %report.plain_observed,
            atomic_observed = %report.atomic_observed,
            atomic_retries = report.atomic_retries,
            "run finished"
        );
        self.enter(HarnessPhase::Reported);
        Ok(report)
    }

    /// Runs the experiment `trials` times and summarizes.
    ///
    /// Stops at the first error. `trials == 0` is treated as one trial.
    pub fn run_trials<T: AtomicInteger>(
        &mut self,
        config: &RunConfiguration,
        trials: usize,
    ) -> Result<TrialSummary<T>, HarnessError> {
        let mut summary = TrialSummary::first(self.run::<T>(config)?);
        for _ in 1..trials {
            summary.record(self.run::<T>(config)?);
        }
        tracing::info!(
            trials = summary.trials,
            raced = summary.raced_trials,
            max_lost = %summary.max_lost_updates,
            "trials finished"
        );
        Ok(summary)
    }
}

/// Runs one experiment on 32-bit counters with the default deadline.
pub fn run(config: &RunConfiguration) -> Result<RunReport<u32>, HarnessError> {
    RaceHarness::new().run(config)
}

fn plain_worker<T: AtomicInteger>(counter: &PlainCounter<T>, config: &RunConfiguration) {
    for _ in 0..config.loop_count {
        counter.increment(config.race_window);
    }
}

/// Returns the failed store-conditionals this worker absorbed.
fn atomic_worker<T: AtomicInteger>(cell: &AtomicCell<T>, config: &RunConfiguration) -> u64 {
    let one = T::one();
    match config.strategy {
        IncrementStrategy::Native => {
            for _ in 0..config.loop_count {
                cell.fetch_add(one);
            }
            0
        }
        IncrementStrategy::LoadLinked => {
            let mut retries = 0u64;
            for _ in 0..config.loop_count {
                let update = cell.fetch_apply_counted(|value| value.wrapping_add(&one));
                retries += u64::from(update.retries);
            }
            retries
        }
    }
}
