//! Error types shared by the atomic cell and the race harness.
//!
//! Nothing on the atomic path returns an error once a cell exists: the retry
//! loop absorbs contention. Errors only arise when storage is rejected, when a
//! run is misconfigured, or when the harness cannot get its workers home.

use core::fmt;
use std::time::Duration;

/// A run or a storage location was rejected before any work started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationError {
    /// `thread_count` was zero.
    ZeroThreads,
    /// `loop_count` was zero.
    ZeroLoops,
    /// The harness needs two workers per configured thread and that count overflows `usize`.
    TooManyThreads {
        /// The rejected thread count.
        thread_count: usize,
    },
    /// `thread_count * loop_count` does not fit the counter's integer type.
    ExpectedOverflow {
        /// Requested workers per group.
        thread_count: usize,
        /// Requested increments per worker.
        loop_count: usize,
        /// Width of the counter type in bits.
        bits: u32,
    },
    /// The storage address is not aligned for atomic access.
    Misaligned {
        /// Address that was offered.
        address: usize,
        /// Alignment the atomic type requires.
        required: usize,
    },
    /// The atomic type does not occupy exactly the bytes of the integer it wraps.
    Undersized {
        /// Size of the atomic representation in bytes.
        atomic: usize,
        /// Size of the plain integer in bytes.
        value: usize,
    },
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroThreads => f.write_str("thread_count must be at least 1"),
            Self::ZeroLoops => f.write_str("loop_count must be at least 1"),
            Self::TooManyThreads { thread_count } => {
                write!(f, "thread_count {thread_count} is too large to spawn two worker groups")
            }
            Self::ExpectedOverflow {
                thread_count,
                loop_count,
                bits,
            } => write!(
                f,
                "{thread_count} threads x {loop_count} loops does not fit a {bits}-bit counter"
            ),
            Self::Misaligned { address, required } => write!(
                f,
                "address {address:#x} is not aligned to {required} bytes for atomic access"
            ),
            Self::Undersized { atomic, value } => write!(
                f,
                "atomic storage is {atomic} bytes but the integer is {value} bytes"
            ),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// Workers did not all complete before the join deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutError {
    /// How long the harness waited.
    pub deadline: Duration,
    /// Workers that reached `Completed` in time.
    pub completed: usize,
    /// Workers spawned.
    pub total: usize,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "only {} of {} workers completed within {:?}",
            self.completed, self.total, self.deadline
        )
    }
}

impl std::error::Error for TimeoutError {}

/// Everything that can stop [`RaceHarness::run`](crate::harness::RaceHarness::run)
/// from producing a report.
#[derive(Debug)]
pub enum HarnessError {
    /// Rejected before any worker was spawned.
    Configuration(ConfigurationError),
    /// The join deadline passed.
    Timeout(TimeoutError),
    /// The OS refused to start a worker thread. Already-started workers were
    /// released without doing any work and joined.
    Spawn(std::io::Error),
    /// A worker panicked. Every worker was still joined first.
    WorkerPanicked {
        /// Index of the first worker found panicked.
        worker: usize,
        /// The panic payload, if it was a string.
        message: String,
    },
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "invalid run configuration: {err}"),
            Self::Timeout(err) => write!(f, "worker join timed out: {err}"),
            Self::Spawn(err) => write!(f, "failed to spawn worker thread: {err}"),
            Self::WorkerPanicked { worker, message } => {
                write!(f, "worker {worker} panicked: {message}")
            }
        }
    }
}

impl std::error::Error for HarnessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(err) => Some(err),
            Self::Timeout(err) => Some(err),
            Self::Spawn(err) => Some(err),
            Self::WorkerPanicked { .. } => None,
        }
    }
}

impl From<ConfigurationError> for HarnessError {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

impl From<TimeoutError> for HarnessError {
    fn from(err: TimeoutError) -> Self {
        Self::Timeout(err)
    }
}
