//! The fixed-width integers an [`AtomicCell`](super::AtomicCell) can hold.
//!
//! Each integer is paired with its native atomic. Under `--cfg loom` the pairing
//! switches to loom's model-checked atomics so the same cell code can be
//! explored exhaustively.

use core::fmt::{Debug, Display};
use core::sync::atomic::Ordering;

use num_traits::{PrimInt, WrappingAdd};

#[cfg(loom)]
use loom::sync::atomic::{
    AtomicI16, AtomicI32, AtomicI8, AtomicIsize, AtomicU16, AtomicU32, AtomicU8, AtomicUsize,
};
#[cfg(all(loom, target_has_atomic = "64"))]
use loom::sync::atomic::{AtomicI64, AtomicU64};

#[cfg(not(loom))]
use core::sync::atomic::{
    AtomicI16, AtomicI32, AtomicI8, AtomicIsize, AtomicU16, AtomicU32, AtomicU8, AtomicUsize,
};
#[cfg(all(not(loom), target_has_atomic = "64"))]
use core::sync::atomic::{AtomicI64, AtomicU64};

mod sealed {
    pub trait Sealed {}
}

/// A primitive integer with a lock-free atomic counterpart of the same width.
///
/// Sealed: implemented for `u8`..`u64`, `usize`, and their signed twins.
pub trait AtomicInteger:
    PrimInt + WrappingAdd + Debug + Display + Send + Sync + 'static + sealed::Sealed
{
    /// The native atomic with the same size and bit validity as `Self`.
    type Atomic: Send + Sync;

    /// Width in bits.
    const BITS: u32;

    /// Wraps `value` in a fresh atomic.
    fn new_atomic(value: Self) -> Self::Atomic;

    /// Atomic load.
    fn atomic_load(atomic: &Self::Atomic, order: Ordering) -> Self;

    /// Atomic store.
    fn atomic_store(atomic: &Self::Atomic, value: Self, order: Ordering);

    /// Native wrapping fetch-and-add.
    fn atomic_fetch_add(atomic: &Self::Atomic, delta: Self, order: Ordering) -> Self;

    /// Weak compare-exchange; may fail even when the value matches.
    fn atomic_compare_exchange_weak(
        atomic: &Self::Atomic,
        current: Self,
        new: Self,
        success: Ordering,
        failure: Ordering,
    ) -> Result<Self, Self>;
}

macro_rules! impl_atomic_integer {
    ($($value:ty => $atomic:ident),* $(,)?) => {$(
        impl sealed::Sealed for $value {}

        impl AtomicInteger for $value {
            type Atomic = $atomic;

            const BITS: u32 = <$value>::BITS;

            #[inline(always)]
            fn new_atomic(value: Self) -> $atomic {
                $atomic::new(value)
            }

            #[inline(always)]
            fn atomic_load(atomic: &$atomic, order: Ordering) -> Self {
                atomic.load(order)
            }

            #[inline(always)]
            fn atomic_store(atomic: &$atomic, value: Self, order: Ordering) {
                atomic.store(value, order);
            }

            #[inline(always)]
            fn atomic_fetch_add(atomic: &$atomic, delta: Self, order: Ordering) -> Self {
                atomic.fetch_add(delta, order)
            }

            #[inline(always)]
            fn atomic_compare_exchange_weak(
                atomic: &$atomic,
                current: Self,
                new: Self,
                success: Ordering,
                failure: Ordering,
            ) -> Result<Self, Self> {
                atomic.compare_exchange_weak(current, new, success, failure)
            }
        }
    )*};
}

impl_atomic_integer! {
    u8 => AtomicU8,
    u16 => AtomicU16,
    u32 => AtomicU32,
    usize => AtomicUsize,
    i8 => AtomicI8,
    i16 => AtomicI16,
    i32 => AtomicI32,
    isize => AtomicIsize,
}

#[cfg(target_has_atomic = "64")]
impl_atomic_integer! {
    u64 => AtomicU64,
    i64 => AtomicI64,
}
