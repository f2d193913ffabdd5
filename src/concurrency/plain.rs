//! The unsynchronized baseline counter.
//!
//! Every access is an individual relaxed atomic load or store, so the program
//! stays free of undefined behaviour, but an increment is two separate
//! accesses. Two workers that load the same value both store `value + 1` and
//! one increment disappears: the hidden update.

use core::sync::atomic::Ordering;

use crate::concurrency::atomic::AtomicInteger;

/// A shared integer incremented with a non-atomic read-modify-write.
pub struct PlainCounter<T: AtomicInteger> {
    value: T::Atomic,
}

impl<T: AtomicInteger> PlainCounter<T> {
    /// Creates a counter holding `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            value: T::new_atomic(initial),
        }
    }

    /// Current value.
    #[inline]
    pub fn load(&self) -> T {
        T::atomic_load(&self.value, Ordering::Relaxed)
    }

    /// Reads, waits `race_window` spin iterations, then writes back `value + 1`.
    ///
    /// Any increment stored by another worker inside that window is overwritten.
    #[inline]
    pub fn increment(&self, race_window: u32) {
        let seen = T::atomic_load(&self.value, Ordering::Relaxed);
        for _ in 0..race_window {
            core::hint::spin_loop();
        }
        T::atomic_store(&self.value, seen.wrapping_add(&T::one()), Ordering::Relaxed);
    }
}

impl<T: AtomicInteger> Default for PlainCounter<T> {
    fn default() -> Self {
        Self::new(T::zero())
    }
}

impl<T: AtomicInteger> core::fmt::Debug for PlainCounter<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("PlainCounter").field(&self.load()).finish()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    #[test]
    fn single_threaded_increments_are_exact() {
        let counter = PlainCounter::new(0u32);
        for _ in 0..10_000 {
            counter.increment(0);
        }
        assert_eq!(counter.load(), 10_000);
    }

    #[test]
    fn race_window_does_not_change_sequential_result() {
        let counter = PlainCounter::<u16>::default();
        for _ in 0..100 {
            counter.increment(16);
        }
        assert_eq!(counter.load(), 100);
    }
}
