//! # `tally` - Linearizable Counters and the Hidden-Update Race
//!
//! Two counters, many threads, one question: does every increment survive?
//!
//! ## The Race
//!
//! An increment is a read, an add and a write. When two threads read the same
//! value, both write back `value + 1`, and one increment vanishes without a
//! trace. That is the *hidden update*, and [`PlainCounter`] exhibits it on
//! purpose.
//!
//! ## The Fix
//!
//! [`AtomicCell`] makes every increment linearizable: the set of all
//! `fetch_add` calls behaves as if executed one at a time, so the final value is
//! exactly the initial value plus the sum of the deltas.
//!
//! Where the hardware has a fetch-and-add, [`AtomicCell::fetch_add`] uses it.
//! Everything else runs through a load-linked / store-conditional retry loop:
//!
//! 1. **Load-linked**: read the value and remember it ([`AtomicCell::load_linked`]).
//! 2. **Compute**: derive the new value purely from the linked one.
//! 3. **Store-conditional**: publish only if the cell still holds the linked
//!    value ([`Link::store_conditional`]).
//! 4. **Retry**: on failure, back off and start again from step 1.
//!
//! A failed attempt always means another thread's attempt succeeded, so the
//! loop is lock-free: the system makes progress even if one caller is unlucky.
//!
//! ## The Harness
//!
//! [`RaceHarness`] runs both counters side by side with the same number of
//! workers and reports the final values:
//!
//! ```rust
//! use tally::{RaceHarness, RunConfiguration};
//!
//! let config = RunConfiguration::new(4, 1_000);
//! let report = RaceHarness::new().run::<u32>(&config).unwrap();
//!
//! assert_eq!(report.expected, 4_000);
//! assert_eq!(report.atomic_observed, report.expected);
//! // `report.plain_observed` is whatever the race left behind.
//! ```
//!
//! ## Single-Threaded Use
//!
//! ```rust
//! use tally::AtomicCell;
//!
//! let cell = AtomicCell::new(0u32);
//! for _ in 0..10_000 {
//!     cell.fetch_add(1);
//! }
//! assert_eq!(cell.load(), 10_000);
//!
//! let previous = cell.fetch_apply(|v| v * 2);
//! assert_eq!(previous, 10_000);
//! assert_eq!(cell.load(), 20_000);
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod concurrency;
pub mod error;
pub mod harness;

pub use concurrency::atomic::{AtomicCell, AtomicInteger, Link, Update};
pub use concurrency::plain::PlainCounter;
pub use error::{ConfigurationError, HarnessError, TimeoutError};
pub use harness::{
    HarnessPhase, IncrementStrategy, RaceHarness, RunConfiguration, RunReport, TrialSummary,
    DEFAULT_RACE_WINDOW,
};
