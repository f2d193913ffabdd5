//! A linearizable integer cell.
//!
//! `fetch_add` goes straight to the hardware fetch-and-add. Everything generic
//! goes through the load-linked / store-conditional retry loop:
//!
//! 1. `load_linked` reads the value and remembers it (the "watch").
//! 2. The caller computes the new value from the linked one.
//! 3. `store_conditional` publishes it only if the cell still holds the linked
//!    value; otherwise it reports the value that got in the way.
//! 4. On failure the whole attempt is discarded and retried after a back-off.
//!
//! A failed attempt means some other writer succeeded, so the system as a whole
//! always makes progress even though one caller can, in theory, retry forever.

use core::fmt;
#[cfg(not(loom))]
use core::mem::{align_of, size_of};
use core::sync::atomic::Ordering;

use crossbeam_utils::Backoff;

use super::integer::AtomicInteger;
use super::link::Link;
#[cfg(not(loom))]
use crate::error::ConfigurationError;

/// An integer shared between threads whose updates are never lost or torn.
#[repr(transparent)]
pub struct AtomicCell<T: AtomicInteger> {
    inner: T::Atomic,
}

/// Outcome of a counted read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update<T> {
    /// Value the successful store-conditional replaced.
    pub previous: T,
    /// Attempts that failed before the one that succeeded.
    pub retries: u32,
}

impl<T: AtomicInteger> AtomicCell<T> {
    /// Creates a cell holding `initial`.
    #[inline]
    pub fn new(initial: T) -> Self {
        Self {
            inner: T::new_atomic(initial),
        }
    }

    /// Views an existing integer as an atomic cell for the lifetime of the borrow.
    ///
    /// Fails if `value` is not aligned for the atomic type. That happens, for
    /// example, with `u64` on 32-bit x86, where the integer only needs 4-byte
    /// alignment but the atomic needs 8.
    #[cfg(not(loom))]
    pub fn from_mut(value: &mut T) -> Result<&Self, ConfigurationError> {
        let ptr: *mut T = value;
        Self::check_layout(ptr as usize)?;
        // SAFETY: layout checked above; `AtomicCell` is `repr(transparent)` over
        // `T::Atomic`, which has the same size and bit validity as `T`. The unique
        // borrow keeps every non-atomic access away for `'_`.
        Ok(unsafe { &*ptr.cast::<Self>() })
    }

    /// Views raw integer storage as an atomic cell.
    ///
    /// Alignment and size are validated; a rejected pointer is never dereferenced.
    ///
    /// # Safety
    /// `ptr` must be valid for reads and writes for `'a`, and for `'a` the storage
    /// must only be accessed through atomic operations.
    #[cfg(not(loom))]
    pub unsafe fn from_ptr<'a>(ptr: *mut T) -> Result<&'a Self, ConfigurationError> {
        Self::check_layout(ptr as usize)?;
        // SAFETY: layout checked above; validity and exclusivity are the caller's.
        Ok(&*ptr.cast::<Self>())
    }

    #[cfg(not(loom))]
    fn check_layout(address: usize) -> Result<(), ConfigurationError> {
        let atomic = size_of::<T::Atomic>();
        let value = size_of::<T>();
        if atomic != value {
            return Err(ConfigurationError::Undersized { atomic, value });
        }
        let required = align_of::<T::Atomic>();
        if address % required != 0 {
            return Err(ConfigurationError::Misaligned { address, required });
        }
        Ok(())
    }

    /// Returns the value of the most recent completed write.
    #[inline]
    pub fn load(&self) -> T {
        T::atomic_load(&self.inner, Ordering::Acquire)
    }

    /// Replaces the value.
    #[inline]
    pub fn store(&self, value: T) {
        T::atomic_store(&self.inner, value, Ordering::Release);
    }

    /// Adds `delta` (wrapping) and returns the value before the add.
    ///
    /// Uses the native fetch-and-add instruction or its compiler lowering.
    #[inline]
    pub fn fetch_add(&self, delta: T) -> T {
        T::atomic_fetch_add(&self.inner, delta, Ordering::AcqRel)
    }

    /// Same contract as [`fetch_add`](Self::fetch_add), executed through the
    /// load-linked / store-conditional retry loop.
    #[inline]
    pub fn fetch_add_linked(&self, delta: T) -> T {
        self.fetch_apply(|value| value.wrapping_add(&delta))
    }

    /// Atomically replaces the value with `f(value)` and returns the old value.
    ///
    /// `f` may run several times under contention and must be a pure function of
    /// its argument.
    #[inline]
    pub fn fetch_apply<F>(&self, f: F) -> T
    where
        F: FnMut(T) -> T,
    {
        self.fetch_apply_counted(f).previous
    }

    /// Like [`fetch_apply`](Self::fetch_apply), also reporting how many
    /// store-conditionals failed before one went through.
    pub fn fetch_apply_counted<F>(&self, mut f: F) -> Update<T>
    where
        F: FnMut(T) -> T,
    {
        let backoff = Backoff::new();
        let mut retries = 0u32;
        loop {
            let link = self.load_linked();
            let next = f(link.value());
            match link.store_conditional(next) {
                Ok(previous) => return Update { previous, retries },
                Err(_) => {
                    retries = retries.saturating_add(1);
                    contend(&backoff);
                }
            }
        }
    }

    /// Reads the value and opens a reservation on it.
    #[inline]
    pub fn load_linked(&self) -> Link<'_, T> {
        Link::new(self, self.load())
    }

    /// Weak compare-exchange backing [`Link::store_conditional`].
    #[inline]
    pub(super) fn compare_exchange_weak(&self, current: T, new: T) -> Result<T, T> {
        T::atomic_compare_exchange_weak(
            &self.inner,
            current,
            new,
            Ordering::AcqRel,
            Ordering::Acquire,
        )
    }
}

#[cfg(not(loom))]
#[inline]
fn contend(backoff: &Backoff) {
    backoff.snooze();
}

// Loom explores every interleaving; a spinning retry has to hand control back
// to the model scheduler explicitly.
#[cfg(loom)]
#[inline]
fn contend(_backoff: &Backoff) {
    loom::thread::yield_now();
}

impl<T: AtomicInteger> Default for AtomicCell<T> {
    fn default() -> Self {
        Self::new(T::zero())
    }
}

impl<T: AtomicInteger> From<T> for AtomicCell<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: AtomicInteger> fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AtomicCell").field(&self.load()).finish()
    }
}
