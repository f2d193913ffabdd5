//! Counters shared between threads.
//!
//! Two flavours live here: [`atomic::AtomicCell`], whose increments are never
//! lost, and [`plain::PlainCounter`], whose increments race on purpose.

pub mod atomic;
pub mod plain;
