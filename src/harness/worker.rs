//! Fork/join plumbing for harness workers.
//!
//! A [`WorkerBatch`] spawns a fixed number of named threads that all run the
//! same job, holds them behind a start gate until the whole batch exists, then
//! waits for every one of them under a deadline. The batch is joined as a unit:
//! callers get either every worker's output or the first failure.

use core::sync::atomic::{AtomicU8, Ordering};
use std::any::Any;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_utils::Backoff;

use crate::error::{HarnessError, TimeoutError};

const GATE_CLOSED: u8 = 0;
const GATE_OPEN: u8 = 1;
const GATE_ABORT: u8 = 2;

/// Lifecycle of a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Spawned, waiting at the start gate.
    Created = 0,
    /// Past the gate, running its loop.
    Running = 1,
    /// Finished, normally or by unwinding.
    Completed = 2,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Running,
            _ => Self::Completed,
        }
    }
}

/// State shared between the harness thread and every worker of one batch.
struct Board {
    gate: AtomicU8,
    states: Vec<AtomicU8>,
    remaining: Mutex<usize>,
    finished: Condvar,
}

impl Board {
    fn new(workers: usize) -> Self {
        Self {
            gate: AtomicU8::new(GATE_CLOSED),
            states: (0..workers)
                .map(|_| AtomicU8::new(WorkerState::Created as u8))
                .collect(),
            remaining: Mutex::new(workers),
            finished: Condvar::new(),
        }
    }

    fn set_state(&self, worker: usize, state: WorkerState) {
        self.states[worker].store(state as u8, Ordering::Release);
    }

    fn state(&self, worker: usize) -> WorkerState {
        WorkerState::from_u8(self.states[worker].load(Ordering::Acquire))
    }

    /// Blocks until the gate opens. Returns `false` if the batch was aborted.
    fn pass_gate(&self) -> bool {
        let backoff = Backoff::new();
        loop {
            match self.gate.load(Ordering::Acquire) {
                GATE_OPEN => return true,
                GATE_ABORT => return false,
                _ => backoff.snooze(),
            }
        }
    }

    fn complete(&self, worker: usize) {
        self.set_state(worker, WorkerState::Completed);
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        *remaining -= 1;
        if *remaining == 0 {
            self.finished.notify_all();
        }
    }
}

/// Marks its worker completed when dropped, including while unwinding.
struct Completion<'a> {
    board: &'a Board,
    worker: usize,
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        self.board.complete(self.worker);
    }
}

/// One worker: an index and a handle on the shared job.
struct WorkerTask<F> {
    id: usize,
    board: Arc<Board>,
    job: Arc<F>,
}

impl<F> WorkerTask<F>
where
    F: Fn(usize) -> u64,
{
    fn run(self) -> u64 {
        let _completion = Completion {
            board: &self.board,
            worker: self.id,
        };
        if !self.board.pass_gate() {
            return 0;
        }
        self.board.set_state(self.id, WorkerState::Running);
        let output = (*self.job)(self.id);
        tracing::trace!(worker = self.id, output, "worker completed");
        output
    }
}

/// A spawned, not yet joined, set of workers.
pub(crate) struct WorkerBatch {
    board: Arc<Board>,
    handles: Vec<JoinHandle<u64>>,
}

impl WorkerBatch {
    /// Spawns `workers` threads running `job(index)` and opens the gate once all
    /// of them exist.
    ///
    /// If a spawn fails, the workers already started are released through the
    /// aborted gate without running `job`, joined, and the spawn error returned.
    pub(crate) fn spawn<F>(label: &str, workers: usize, job: F) -> Result<Self, HarnessError>
    where
        F: Fn(usize) -> u64 + Send + Sync + 'static,
    {
        let board = Arc::new(Board::new(workers));
        let job = Arc::new(job);
        let mut handles = Vec::with_capacity(workers);

        for id in 0..workers {
            let task = WorkerTask {
                id,
                board: Arc::clone(&board),
                job: Arc::clone(&job),
            };
            let spawned = thread::Builder::new()
                .name(format!("{label}-{id}"))
                .spawn(move || task.run());
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    tracing::warn!(worker = id, error = %err, "worker spawn failed; aborting batch");
                    board.gate.store(GATE_ABORT, Ordering::Release);
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(HarnessError::Spawn(err));
                }
            }
        }

        board.gate.store(GATE_OPEN, Ordering::Release);
        Ok(Self { board, handles })
    }

    /// Number of workers in the batch.
    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    /// Waits up to `deadline` for every worker to complete, then joins them.
    ///
    /// Outputs come back in worker order. A panic in any worker is reported
    /// only after all workers have been joined. On timeout the unfinished
    /// workers are detached; they own everything they touch.
    pub(crate) fn join(self, deadline: Duration) -> Result<Vec<u64>, HarnessError> {
        let total = self.handles.len();
        {
            let remaining = self
                .board
                .remaining
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let (remaining, _) = self
                .board
                .finished
                .wait_timeout_while(remaining, deadline, |remaining| *remaining > 0)
                .unwrap_or_else(PoisonError::into_inner);
            if *remaining > 0 {
                let err = TimeoutError {
                    deadline,
                    completed: total - *remaining,
                    total,
                };
                let stuck: Vec<usize> = (0..total)
                    .filter(|&worker| self.board.state(worker) != WorkerState::Completed)
                    .collect();
                tracing::error!(%err, ?stuck, "workers missed the join deadline");
                return Err(err.into());
            }
        }

        let mut outputs = Vec::with_capacity(total);
        let mut first_panic = None;
        for (worker, handle) in self.handles.into_iter().enumerate() {
            match handle.join() {
                Ok(output) => outputs.push(output),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    tracing::error!(worker, %message, "worker panicked");
                    first_panic.get_or_insert(HarnessError::WorkerPanicked { worker, message });
                }
            }
        }

        match first_panic {
            Some(err) => Err(err),
            None => Ok(outputs),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    const DEADLINE: Duration = Duration::from_secs(30);

    #[test]
    fn outputs_come_back_in_worker_order() {
        let batch = WorkerBatch::spawn("order", 6, |id| id as u64 * 10).unwrap();
        assert_eq!(batch.len(), 6);
        assert_eq!(batch.join(DEADLINE).unwrap(), vec![0, 10, 20, 30, 40, 50]);
    }

    #[test]
    fn every_worker_runs_exactly_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&runs);
        let batch = WorkerBatch::spawn("once", 8, move |_| {
            counted.fetch_add(1, Ordering::Relaxed);
            1
        })
        .unwrap();
        let outputs = batch.join(DEADLINE).unwrap();
        assert_eq!(outputs.iter().sum::<u64>(), 8);
        assert_eq!(runs.load(Ordering::Relaxed), 8);
    }

    #[test]
    fn states_reach_completed_after_join() {
        let release = Arc::new(AtomicU8::new(0));
        let gate = Arc::clone(&release);
        let batch = WorkerBatch::spawn("states", 2, move |_| {
            while gate.load(Ordering::Acquire) == 0 {
                thread::yield_now();
            }
            0
        })
        .unwrap();
        assert_ne!(batch.board.state(0), WorkerState::Completed);
        release.store(1, Ordering::Release);

        let board = Arc::clone(&batch.board);
        batch.join(DEADLINE).unwrap();
        assert_eq!(board.state(0), WorkerState::Completed);
        assert_eq!(board.state(1), WorkerState::Completed);
    }

    #[test]
    fn first_panic_is_reported_after_joining_everyone() {
        let finished = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&finished);
        let batch = WorkerBatch::spawn("panic", 4, move |id| {
            if id == 2 {
                panic!("worker two gave up");
            }
            counted.fetch_add(1, Ordering::Relaxed);
            0
        })
        .unwrap();

        match batch.join(DEADLINE) {
            Err(HarnessError::WorkerPanicked { worker, message }) => {
                assert_eq!(worker, 2);
                assert_eq!(message, "worker two gave up");
            }
            other => panic!("expected WorkerPanicked, got {other:?}"),
        }
        assert_eq!(finished.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn stuck_worker_times_out() {
        let release = Arc::new(AtomicU8::new(0));
        let gate = Arc::clone(&release);
        let batch = WorkerBatch::spawn("stuck", 3, move |id| {
            if id == 0 {
                while gate.load(Ordering::Acquire) == 0 {
                    thread::sleep(Duration::from_millis(1));
                }
            }
            0
        })
        .unwrap();

        let deadline = Duration::from_millis(100);
        let result = batch.join(deadline);
        release.store(1, Ordering::Release);
        match result {
            Err(HarnessError::Timeout(err)) => {
                assert_eq!(err.deadline, deadline);
                assert_eq!(err.total, 3);
                assert!(err.completed <= 2);
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
    }

    #[test]
    fn panic_message_handles_payload_kinds() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u8), "non-string panic payload");
    }
}
