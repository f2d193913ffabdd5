//! Load-linked / store-conditional reservations.

use super::cell::AtomicCell;
use super::integer::AtomicInteger;

/// A value read by [`AtomicCell::load_linked`], together with the right to try
/// publishing a successor to it.
///
/// The store-conditional is a weak compare-exchange against the linked value.
/// Like a hardware SC it can fail spuriously. Unlike one, it cannot see a write
/// that put back the very value it linked; for updates computed purely from
/// the linked value that write is indistinguishable from no write at all.
#[must_use = "a link publishes nothing until `store_conditional` is called"]
pub struct Link<'a, T: AtomicInteger> {
    cell: &'a AtomicCell<T>,
    linked: T,
}

impl<'a, T: AtomicInteger> Link<'a, T> {
    #[inline]
    pub(super) fn new(cell: &'a AtomicCell<T>, linked: T) -> Self {
        Self { cell, linked }
    }

    /// The value observed when the link was made.
    #[inline]
    pub fn value(&self) -> T {
        self.linked
    }

    /// Stores `new` if nothing has replaced the linked value.
    ///
    /// Returns `Ok(linked)` on success, `Err(current)` if the store did not
    /// happen. `current` may equal the linked value after a spurious failure.
    #[inline]
    pub fn store_conditional(self, new: T) -> Result<T, T> {
        self.cell.compare_exchange_weak(self.linked, new)
    }
}

impl<T: AtomicInteger> core::fmt::Debug for Link<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Link").field("linked", &self.linked).finish()
    }
}
