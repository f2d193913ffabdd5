//! Run parameters.

use core::fmt;

use num_traits::NumCast;
use serde::{Deserialize, Serialize};

use crate::concurrency::atomic::AtomicInteger;
use crate::error::ConfigurationError;

/// Workers per group when nothing else is configured.
pub const DEFAULT_THREAD_COUNT: usize = 16;
/// Increments per worker when nothing else is configured.
pub const DEFAULT_LOOP_COUNT: usize = 10_000;
/// Spin iterations between a plain read and its write-back when nothing else is
/// configured.
///
/// Long enough that a preempted plain worker is almost always parked inside the
/// window, so lost updates show up on a single core too.
pub const DEFAULT_RACE_WINDOW: u32 = 1_000;

/// How atomic-group workers increment their cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IncrementStrategy {
    /// The hardware fetch-and-add.
    #[default]
    Native,
    /// The explicit load-linked / store-conditional retry loop.
    LoadLinked,
}

impl fmt::Display for IncrementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Native => "native",
            Self::LoadLinked => "load-linked",
        })
    }
}

/// Immutable parameters of one harness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfiguration {
    /// Workers in each of the two groups.
    pub thread_count: usize,
    /// Increments each worker performs.
    pub loop_count: usize,
    /// Spin iterations between the plain counter's read and its write-back.
    pub race_window: u32,
    /// How the atomic group increments.
    pub strategy: IncrementStrategy,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self::new(DEFAULT_THREAD_COUNT, DEFAULT_LOOP_COUNT)
    }
}

impl RunConfiguration {
    /// A configuration with the default race window and native increments.
    pub const fn new(thread_count: usize, loop_count: usize) -> Self {
        Self {
            thread_count,
            loop_count,
            race_window: DEFAULT_RACE_WINDOW,
            strategy: IncrementStrategy::Native,
        }
    }

    /// Sets the plain counter's race window.
    #[must_use]
    pub const fn with_race_window(mut self, race_window: u32) -> Self {
        self.race_window = race_window;
        self
    }

    /// Sets how the atomic group increments.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: IncrementStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Checks the counts without reference to a counter width.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.thread_count == 0 {
            return Err(ConfigurationError::ZeroThreads);
        }
        if self.loop_count == 0 {
            return Err(ConfigurationError::ZeroLoops);
        }
        self.total_workers().map(|_| ())
    }

    /// Workers across both groups.
    pub fn total_workers(&self) -> Result<usize, ConfigurationError> {
        self.thread_count
            .checked_mul(2)
            .ok_or(ConfigurationError::TooManyThreads {
                thread_count: self.thread_count,
            })
    }

    /// `thread_count * loop_count` in the counter's type, validating the run on
    /// the way.
    pub fn expected<T: AtomicInteger>(&self) -> Result<T, ConfigurationError> {
        self.validate()?;
        let overflow = ConfigurationError::ExpectedOverflow {
            thread_count: self.thread_count,
            loop_count: self.loop_count,
            bits: T::BITS,
        };
        let threads = <T as NumCast>::from(self.thread_count).ok_or(overflow)?;
        let loops = <T as NumCast>::from(self.loop_count).ok_or(overflow)?;
        threads.checked_mul(&loops).ok_or(overflow)
    }
}

impl fmt::Display for RunConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} threads x {} loops ({} increments, window {})",
            self.thread_count, self.loop_count, self.strategy, self.race_window
        )
    }
}
