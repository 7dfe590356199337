//! Isolated fast-forward execution.
//!
//! A [`ComputeJob`] owns a background thread that runs its own copy of a machine until the
//! machine halts, the time budget runs out, or the job is cancelled. The machine goes in as a
//! snapshot and comes back as a snapshot; nothing is shared by reference. The job sends at most
//! one message back.

use crate::encoder::Snapshot;
use crate::machine::TuringMachine;
use crate::types::{Halt, Step, TuringMachineError};
use crossbeam::channel::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Number of transitions executed between two cancellation and deadline checks.
const CHECK_INTERVAL: u64 = 4096;

/// Result of an isolated computation.
#[derive(Debug, Clone, PartialEq)]
pub enum ComputeOutcome {
    /// The machine halted. `error` holds the runtime error that stopped it, if any.
    Finished {
        snapshot: Snapshot,
        error: Option<TuringMachineError>,
    },
    /// The time budget ran out before the machine halted.
    TimedOut,
    /// The worker stopped without reporting a result.
    Aborted,
}

/// Handle to a running isolated computation.
///
/// Dropping the handle cancels the computation. Once cancelled, no outcome can be received.
#[derive(Debug)]
pub struct ComputeJob {
    cancel: Arc<AtomicBool>,
    results: Receiver<ComputeOutcome>,
    deadline: Option<Instant>,
}

impl ComputeJob {
    /// Starts computing `snapshot` on a new thread.
    ///
    /// The snapshot is imported before the thread starts, so an invalid snapshot fails here.
    ///
    /// # Returns
    ///
    /// * `Err(TuringMachineError::SnapshotError)` if the snapshot cannot be imported.
    /// * `Err(TuringMachineError::UnsupportedEnvironment)` if no thread can be spawned.
    pub fn spawn(snapshot: Snapshot, timeout: Duration) -> Result<Self, TuringMachineError> {
        let machine = TuringMachine::import(snapshot)?;
        let (sender, results) = channel::bounded(1);
        let cancel = Arc::new(AtomicBool::new(false));
        // A timeout too large to represent is as good as none
        let deadline = Instant::now().checked_add(timeout);

        let flag = cancel.clone();
        thread::Builder::new()
            .name("tms-compute".to_string())
            .spawn(move || compute(machine, deadline, &flag, &sender))
            .map_err(|e| {
                warn!("failed to spawn compute thread: {e}");
                TuringMachineError::UnsupportedEnvironment
            })?;

        Ok(Self {
            cancel,
            results,
            deadline,
        })
    }

    /// Returns the outcome if it is available, without blocking.
    ///
    /// Once the deadline has passed, this reports `TimedOut` even if the worker has not noticed
    /// yet, and cancels the worker.
    pub fn try_outcome(&self) -> Option<ComputeOutcome> {
        match self.results.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(channel::TryRecvError::Disconnected) => Some(ComputeOutcome::Aborted),
            Err(channel::TryRecvError::Empty) => self.expire(),
        }
    }

    /// Waits at most `tick` for the outcome.
    pub fn wait_timeout(&self, tick: Duration) -> Option<ComputeOutcome> {
        let wait = match self.deadline {
            Some(deadline) => tick.min(deadline.saturating_duration_since(Instant::now())),
            None => tick,
        };

        crossbeam::select! {
            recv(self.results) -> msg => Some(msg.unwrap_or(ComputeOutcome::Aborted)),
            recv(channel::after(wait)) -> _ => self.expire(),
        }
    }

    /// Asks the worker to stop. Any result it produces afterwards is never delivered.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    fn expire(&self) -> Option<ComputeOutcome> {
        let expired = self
            .deadline
            .is_some_and(|deadline| Instant::now() >= deadline);
        if !expired {
            return None;
        }

        self.cancel();
        Some(ComputeOutcome::TimedOut)
    }
}

impl Drop for ComputeJob {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Runs on the worker thread.
fn compute(
    mut machine: TuringMachine,
    deadline: Option<Instant>,
    cancel: &AtomicBool,
    results: &Sender<ComputeOutcome>,
) {
    loop {
        if cancel.load(Ordering::Acquire) {
            debug!(transitions = machine.transitions(), "compute cancelled");
            return;
        }

        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            debug!(transitions = machine.transitions(), "compute timed out");
            // The receiver is gone if the caller gave up first
            let _ = results.send(ComputeOutcome::TimedOut);
            return;
        }

        if let Step::Halt(halt) = machine.run(CHECK_INTERVAL) {
            let error = match halt {
                Halt::Ok => None,
                Halt::Err(error) => Some(error),
            };

            debug!(transitions = machine.transitions(), "compute finished");
            let _ = results.send(ComputeOutcome::Finished {
                snapshot: machine.export(),
                error,
            });
            return;
        }
    }
}
