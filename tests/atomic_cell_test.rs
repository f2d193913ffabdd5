#![cfg(not(loom))]

use proptest::prelude::*;
use std::thread;
use tally::{AtomicCell, PlainCounter};

fn assert_send_sync<T: Send + Sync>() {}

#[test]
fn cells_and_counters_are_send_sync() {
    assert_send_sync::<AtomicCell<u8>>();
    assert_send_sync::<AtomicCell<u32>>();
    assert_send_sync::<AtomicCell<u64>>();
    assert_send_sync::<AtomicCell<isize>>();
    assert_send_sync::<PlainCounter<u32>>();
}

#[test]
fn ten_thousand_sequential_increments() {
    let cell = AtomicCell::new(0u32);
    for _ in 0..10_000 {
        cell.fetch_add(1);
    }
    assert_eq!(cell.load(), 10_000);
}

#[test]
fn load_twice_without_writes_agrees() {
    let cell = AtomicCell::new(77u64);
    let first = cell.load();
    let second = cell.load();
    assert_eq!(first, second);
}

#[test]
fn store_is_visible_to_later_loads() {
    let cell = AtomicCell::<i32>::default();
    assert_eq!(cell.load(), 0);
    cell.store(-4);
    assert_eq!(cell.load(), -4);
    assert_eq!(cell.fetch_add(4), -4);
    assert_eq!(cell.load(), 0);
}

#[test]
fn concurrent_native_increments_are_exact() {
    const THREADS: usize = 8;
    const LOOPS: u64 = 20_000;

    let cell = AtomicCell::new(0u64);
    let cell = &cell;
    thread::scope(|s| {
        for _ in 0..THREADS {
            s.spawn(move || {
                for _ in 0..LOOPS {
                    cell.fetch_add(1);
                }
            });
        }
    });
    assert_eq!(cell.load(), THREADS as u64 * LOOPS);
}

#[test]
fn concurrent_linked_increments_are_exact() {
    const THREADS: usize = 8;
    const LOOPS: u64 = 20_000;

    let cell = AtomicCell::new(0u64);
    let cell = &cell;
    let retries: u64 = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(move || {
                    let mut retries = 0u64;
                    for _ in 0..LOOPS {
                        retries += u64::from(cell.fetch_apply_counted(|v| v + 1).retries);
                    }
                    retries
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).sum()
    });

    assert_eq!(cell.load(), THREADS as u64 * LOOPS);
    // Every failed attempt is paid for by another thread's success.
    assert!(
        retries < (THREADS as u64) * (THREADS as u64) * LOOPS,
        "retries = {retries}"
    );
}

#[test]
fn mixed_native_and_linked_increments_compose() {
    let cell = AtomicCell::new(0u32);
    thread::scope(|s| {
        for worker in 0..6 {
            let cell = &cell;
            s.spawn(move || {
                for _ in 0..5_000 {
                    if worker % 2 == 0 {
                        cell.fetch_add(1);
                    } else {
                        cell.fetch_add_linked(1);
                    }
                }
            });
        }
    });
    assert_eq!(cell.load(), 30_000);
}

#[test]
fn previous_values_are_handed_out_exactly_once() {
    const THREADS: usize = 4;
    const LOOPS: usize = 2_500;

    let cell = AtomicCell::new(0usize);
    let cell = &cell;
    let mut seen: Vec<usize> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(move || {
                    (0..LOOPS)
                        .map(|_| cell.fetch_add_linked(1))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect()
    });

    seen.sort_unstable();
    let expected: Vec<usize> = (0..THREADS * LOOPS).collect();
    assert_eq!(seen, expected);
}

proptest! {
    #[test]
    fn fetch_add_returns_running_sum(initial in any::<u32>(), deltas in proptest::collection::vec(any::<u32>(), 0..64)) {
        let cell = AtomicCell::new(initial);
        let mut model = initial;
        for delta in deltas {
            prop_assert_eq!(cell.fetch_add(delta), model);
            model = model.wrapping_add(delta);
        }
        prop_assert_eq!(cell.load(), model);
    }

    #[test]
    fn linked_and_native_adds_agree(initial in any::<i16>(), deltas in proptest::collection::vec(any::<i16>(), 0..64)) {
        let native = AtomicCell::new(initial);
        let linked = AtomicCell::new(initial);
        for delta in deltas {
            prop_assert_eq!(native.fetch_add(delta), linked.fetch_add_linked(delta));
        }
        prop_assert_eq!(native.load(), linked.load());
    }

    #[test]
    fn fetch_apply_matches_sequential_model(initial in any::<u8>(), ops in proptest::collection::vec(0u8..4, 0..32)) {
        let cell = AtomicCell::new(initial);
        let mut model = initial;
        for op in ops {
            let step = |v: u8| match op {
                0 => v.wrapping_add(1),
                1 => v.wrapping_mul(3),
                2 => v ^ 0x5a,
                _ => v.rotate_left(1),
            };
            prop_assert_eq!(cell.fetch_apply(&step), model);
            model = step(model);
        }
        prop_assert_eq!(cell.load(), model);
    }
}
