//! Lock-free integer cells.
//!
//! [`AtomicCell`] is the primitive: a fixed-width integer whose increments are
//! linearizable. Arithmetic the hardware supports directly (`fetch_add`) uses
//! the native instruction; anything else goes through an explicit
//! load-linked / store-conditional retry loop ([`AtomicCell::fetch_apply`],
//! [`Link`]).

/// The atomic cell and its retry loop.
pub mod cell;
/// Integer widths a cell can hold.
pub mod integer;
/// Load-linked reservations.
pub mod link;

pub use cell::{AtomicCell, Update};
pub use integer::AtomicInteger;
pub use link::Link;
