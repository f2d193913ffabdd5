//! Model-checked interleavings. Run with `RUSTFLAGS="--cfg loom" cargo test --test loom_test --release`.
#![cfg(loom)]

use loom::sync::Arc;
use loom::thread;
use std::sync::atomic::{AtomicBool, Ordering};
use tally::{AtomicCell, PlainCounter};

#[test]
fn linked_increments_are_never_lost() {
    loom::model(|| {
        let cell = Arc::new(AtomicCell::new(0u32));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    cell.fetch_add_linked(1);
                    cell.fetch_add_linked(1);
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.load(), 4);
    });
}

#[test]
fn native_and_linked_adds_hand_out_distinct_previous_values() {
    loom::model(|| {
        let cell = Arc::new(AtomicCell::new(0u32));
        let other = Arc::clone(&cell);
        let native = thread::spawn(move || other.fetch_add(1));
        let linked = cell.fetch_add_linked(1);
        let native = native.join().unwrap();

        let mut seen = [native, linked];
        seen.sort_unstable();
        assert_eq!(seen, [0, 1]);
        assert_eq!(cell.load(), 2);
    });
}

#[test]
fn store_conditional_fails_after_a_competing_add() {
    loom::model(|| {
        let cell = Arc::new(AtomicCell::new(0u32));
        let other = Arc::clone(&cell);
        let writer = thread::spawn(move || other.fetch_add(7));

        let link = cell.load_linked();
        let linked = link.value();
        let outcome = link.store_conditional(1);
        let before_writer = writer.join().unwrap();

        // Both writes are read-modify-writes, so they are totally ordered and
        // the final value tells which one went first.
        match outcome {
            Ok(previous) => {
                assert_eq!(previous, linked);
                match linked {
                    0 => {
                        assert_eq!(before_writer, 1);
                        assert_eq!(cell.load(), 8);
                    }
                    7 => {
                        assert_eq!(before_writer, 0);
                        assert_eq!(cell.load(), 1);
                    }
                    other => panic!("linked an impossible value {other}"),
                }
            }
            Err(current) => {
                assert!(current == 7 || current == linked);
                assert_eq!(cell.load(), 7);
            }
        }
    });
}

#[test]
fn plain_counter_has_a_losing_interleaving() {
    static LOST: AtomicBool = AtomicBool::new(false);

    loom::model(|| {
        let counter = Arc::new(PlainCounter::new(0u32));
        let other = Arc::clone(&counter);
        let racer = thread::spawn(move || other.increment(0));
        counter.increment(0);
        racer.join().unwrap();

        let total = counter.load();
        assert!(total == 1 || total == 2);
        if total == 1 {
            LOST.store(true, Ordering::Relaxed);
        }
    });

    assert!(LOST.load(Ordering::Relaxed));
}
