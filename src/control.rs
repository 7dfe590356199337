//! This module provides `TuringControl`, the engine a host talks to.
//!
//! The engine owns the machine, the notification channels and the current activity. It offers
//! three ways to execute a program:
//!
//! * `step` performs exactly one transition.
//! * `start` runs continuously, one transition per delay. The host drives the cadence by calling
//!   `poll` (or the blocking `wait`); `halt` takes effect before the next step.
//! * `compute` fast-forwards to the end in an isolated worker with a time budget, then merges
//!   the worker's result back.
//!
//! Every operation checks its preconditions and fails with a named error instead of silently
//! doing nothing.

use crate::config::Config;
use crate::encoder::Snapshot;
use crate::events::{EventKind, Events};
use crate::machine::TuringMachine;
use crate::parser::compile;
use crate::types::{Halt, Step, TuringMachineError};
use crate::worker::{ComputeJob, ComputeOutcome};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Longest uninterrupted sleep of `wait`, so halt requests are noticed promptly.
const WAIT_TICK: Duration = Duration::from_millis(20);

/// What the engine is currently doing.
#[derive(Debug)]
enum Activity {
    Idle,
    /// Continuous run; the next step is due at `next_step`.
    Running { next_step: Instant },
    /// Fast-forward in an isolated worker.
    Computing(ComputeJob),
}

/// Requests `halt` from another thread.
///
/// The request is picked up by the next `poll`, between two steps.
#[derive(Debug, Clone)]
pub struct HaltHandle(Arc<AtomicBool>);

impl HaltHandle {
    pub fn halt(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// The host-facing Turing Machine engine.
#[derive(Debug)]
pub struct TuringControl {
    machine: Option<TuringMachine>,
    config: Config,
    events: Events,
    activity: Activity,
    halt_request: Arc<AtomicBool>,
}

impl Default for TuringControl {
    fn default() -> Self {
        Self::new()
    }
}

impl TuringControl {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            machine: None,
            config,
            events: Events::new(),
            activity: Activity::Idle,
            halt_request: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Changes the pause between two steps of a continuous run.
    ///
    /// A step that is already scheduled keeps its time.
    pub fn set_delay(&mut self, delay: Duration) {
        self.config.delay_ms = delay.as_millis().try_into().unwrap_or(u64::MAX);
    }

    /// The notification channels of this engine.
    pub fn events(&mut self) -> &mut Events {
        &mut self.events
    }

    pub fn halt_handle(&self) -> HaltHandle {
        HaltHandle(self.halt_request.clone())
    }

    /// The active machine, if a program has been installed.
    pub fn machine(&self) -> Option<&TuringMachine> {
        self.machine.as_ref()
    }

    pub fn is_programmed(&self) -> bool {
        self.machine.is_some()
    }

    /// Checks if the engine is running, either continuously or in the isolated worker.
    pub fn is_running(&self) -> bool {
        !matches!(self.activity, Activity::Idle)
    }

    pub fn is_computing(&self) -> bool {
        matches!(self.activity, Activity::Computing(_))
    }

    pub fn is_halted(&self) -> bool {
        self.machine.as_ref().is_some_and(TuringMachine::is_halted)
    }

    /// Compiles and installs a program.
    ///
    /// The previous program stays active unless compilation succeeds completely. On success the
    /// machine starts over: head at `offset`, initial tape loaded from `offset`, counters zeroed.
    ///
    /// # Returns
    ///
    /// * `Err(TuringMachineError::AlreadyProgramming)` if the engine is running.
    /// * Any compilation error, see [`crate::parser::parse`].
    pub fn init(
        &mut self,
        source: &str,
        initial_tape: &str,
        offset: i64,
    ) -> Result<(), TuringMachineError> {
        if self.is_running() {
            return Err(TuringMachineError::AlreadyProgramming);
        }

        let program = compile(source, initial_tape, offset)?;
        debug!(
            states = program.table.state_count(),
            transitions = program.table.len(),
            offset,
            "program installed"
        );

        self.machine = Some(TuringMachine::new(program));
        self.events.emit(EventKind::UiUpdate);

        Ok(())
    }

    /// Starts a continuous run.
    ///
    /// The first step is executed immediately; the following ones are due one delay apart and
    /// are executed by `poll`. The run ends when the machine halts or `halt` is called.
    pub fn start(&mut self) -> Result<(), TuringMachineError> {
        self.require_ready()?;

        debug!(delay_ms = self.config.delay_ms, "run started");
        self.halt_request.store(false, Ordering::Release);
        self.activity = Activity::Running {
            next_step: Instant::now(),
        };
        self.run_step();

        Ok(())
    }

    /// Stops a continuous run or cancels an isolated computation.
    ///
    /// A cancelled computation's result is discarded, even if it already finished.
    pub fn halt(&mut self) -> Result<(), TuringMachineError> {
        match std::mem::replace(&mut self.activity, Activity::Idle) {
            Activity::Idle => Err(TuringMachineError::NotRunning),
            Activity::Running { .. } => {
                debug!("run halted");
                Ok(())
            }
            Activity::Computing(job) => {
                job.cancel();
                debug!("compute interrupted");
                self.events.emit(EventKind::SkipInterrupt);
                Ok(())
            }
        }
    }

    /// Restores the initial configuration of the installed program.
    pub fn reset(&mut self) -> Result<(), TuringMachineError> {
        if self.is_running() {
            return Err(TuringMachineError::AlreadyRunning);
        }

        let machine = self
            .machine
            .as_mut()
            .ok_or(TuringMachineError::NotProgrammed)?;
        machine.reset();
        debug!("machine reset");
        self.events.emit(EventKind::UiUpdate);

        Ok(())
    }

    /// Executes exactly one transition.
    pub fn step(&mut self) -> Result<(), TuringMachineError> {
        self.require_ready()?;

        self.advance();
        self.events.emit(EventKind::UiUpdate);

        Ok(())
    }

    /// Fast-forwards to the end in an isolated worker.
    ///
    /// `timeout` defaults to the configured timeout. The outcome is merged by `poll` or `wait`:
    /// a finished run replaces the machine, a timeout leaves the machine as it was.
    pub fn compute(&mut self, timeout: Option<Duration>) -> Result<(), TuringMachineError> {
        self.require_ready()?;

        let timeout = timeout.unwrap_or_else(|| self.config.timeout());
        let job = ComputeJob::spawn(self.export()?, timeout)?;
        debug!(timeout_ms = timeout.as_millis() as u64, "compute started");
        self.activity = Activity::Computing(job);

        Ok(())
    }

    /// Performs any work that is due without blocking.
    ///
    /// Executes the next step of a continuous run once its time has come, merges a finished
    /// computation, and honours halt requests made through a [`HaltHandle`].
    ///
    /// Returns `true` while the engine is still running.
    pub fn poll(&mut self) -> bool {
        if self.halt_request.swap(false, Ordering::AcqRel) && self.is_running() {
            self.stop();
        }

        match &self.activity {
            Activity::Idle => {}
            Activity::Running { next_step } => {
                if Instant::now() >= *next_step {
                    self.run_step();
                }
            }
            Activity::Computing(job) => {
                if let Some(outcome) = job.try_outcome() {
                    self.finish_compute(outcome);
                }
            }
        }

        self.is_running()
    }

    /// Returns when the next step of a continuous run is due.
    pub fn next_step_at(&self) -> Option<Instant> {
        match self.activity {
            Activity::Running { next_step } => Some(next_step),
            _ => None,
        }
    }

    /// Blocks until the engine is idle.
    pub fn wait(&mut self) {
        while self.poll() {
            let outcome = match &self.activity {
                Activity::Computing(job) => job.wait_timeout(WAIT_TICK),
                Activity::Running { next_step } => {
                    let due = next_step.saturating_duration_since(Instant::now());
                    thread::sleep(due.min(WAIT_TICK));
                    None
                }
                Activity::Idle => None,
            };

            if let Some(outcome) = outcome {
                self.finish_compute(outcome);
            }
        }
    }

    /// Exports a full copy of the machine.
    pub fn export(&self) -> Result<Snapshot, TuringMachineError> {
        let machine = self
            .machine
            .as_ref()
            .ok_or(TuringMachineError::NotProgrammed)?;

        let mut snapshot = machine.export();
        snapshot.default_timeout = self.config.timeout_ms;

        Ok(snapshot)
    }

    /// Replaces the machine with an exported copy.
    pub fn import(&mut self, snapshot: Snapshot) -> Result<(), TuringMachineError> {
        if self.is_running() {
            return Err(TuringMachineError::AlreadyRunning);
        }

        self.machine = Some(TuringMachine::import(snapshot)?);
        self.events.emit(EventKind::UiUpdate);

        Ok(())
    }

    /// Checks the preconditions shared by `start`, `step` and `compute`.
    fn require_ready(&self) -> Result<(), TuringMachineError> {
        let machine = self
            .machine
            .as_ref()
            .ok_or(TuringMachineError::NotProgrammed)?;

        if self.is_running() {
            return Err(TuringMachineError::AlreadyRunning);
        }

        if machine.is_halted() {
            return Err(TuringMachineError::MachineHalted);
        }

        Ok(())
    }

    /// Executes one transition and reports how it ended.
    fn advance(&mut self) {
        let Some(machine) = self.machine.as_mut() else {
            return;
        };

        match machine.transition() {
            Step::Continue => {}
            Step::Halt(Halt::Ok) => self.events.emit(EventKind::HaltState),
            Step::Halt(Halt::Err(error)) => {
                debug!(%error, "machine stopped");
                self.events.emit_runtime_error(&error);
            }
        }
    }

    /// Executes one step of a continuous run and schedules the next.
    fn run_step(&mut self) {
        self.advance();
        self.events.emit(EventKind::UiUpdate);

        self.activity = if self.is_halted() {
            debug!("run finished");
            Activity::Idle
        } else {
            Activity::Running {
                next_step: Instant::now() + self.config.delay(),
            }
        };
    }

    /// Halts whatever is running.
    fn stop(&mut self) {
        if let Err(error) = self.halt() {
            debug!(%error, "halt request ignored");
        }
    }

    /// Merges the outcome of an isolated computation.
    fn finish_compute(&mut self, outcome: ComputeOutcome) {
        self.activity = Activity::Idle;

        match outcome {
            ComputeOutcome::Finished { snapshot, error } => {
                match TuringMachine::import(snapshot) {
                    Ok(machine) => self.machine = Some(machine),
                    Err(error) => {
                        warn!(%error, "discarding compute result");
                        self.events.emit_runtime_error(&error);
                        return;
                    }
                }

                debug!("compute merged");
                self.events.emit(EventKind::UiUpdate);
                match error {
                    Some(error) => self.events.emit_runtime_error(&error),
                    None => {
                        self.events.emit(EventKind::SkipDone);
                        self.events.emit(EventKind::HaltState);
                    }
                }
            }
            ComputeOutcome::TimedOut => {
                debug!("compute timed out");
                self.events.emit(EventKind::SkipTimeout);
            }
            ComputeOutcome::Aborted => {
                warn!("compute worker stopped without a result");
                self.events.emit_runtime_error(&TuringMachineError::ComputeAborted);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::{decode, encode};
    use crate::types::{Direction, StateId};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Never halts: walks right forever.
    const ENDLESS: &str = "1,_ 1,_,>";

    fn control(delay_ms: u64) -> TuringControl {
        TuringControl::with_config(Config {
            delay_ms,
            ..Config::default()
        })
    }

    fn record(control: &mut TuringControl) -> Rc<RefCell<Vec<EventKind>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let events = control.events();

        let sink = log.clone();
        events.on_halt_state(move || sink.borrow_mut().push(EventKind::HaltState));
        let sink = log.clone();
        events.on_ui_update(move || sink.borrow_mut().push(EventKind::UiUpdate));
        let sink = log.clone();
        events.on_skip_done(move || sink.borrow_mut().push(EventKind::SkipDone));
        let sink = log.clone();
        events.on_skip_interrupt(move || sink.borrow_mut().push(EventKind::SkipInterrupt));
        let sink = log.clone();
        events.on_skip_timeout(move || sink.borrow_mut().push(EventKind::SkipTimeout));
        let sink = log.clone();
        events.on_runtime_error(move |_| sink.borrow_mut().push(EventKind::RuntimeError));

        log
    }

    fn machine(control: &TuringControl) -> &TuringMachine {
        control.machine().unwrap()
    }

    #[test]
    fn test_operations_need_a_program() {
        let mut control = TuringControl::new();

        assert_eq!(control.step(), Err(TuringMachineError::NotProgrammed));
        assert_eq!(control.start(), Err(TuringMachineError::NotProgrammed));
        assert_eq!(control.reset(), Err(TuringMachineError::NotProgrammed));
        assert_eq!(control.compute(None), Err(TuringMachineError::NotProgrammed));
        assert_eq!(control.halt(), Err(TuringMachineError::NotRunning));
        assert!(matches!(
            control.export(),
            Err(TuringMachineError::NotProgrammed)
        ));
    }

    #[test]
    fn test_single_step() {
        let mut control = TuringControl::new();
        control.init("1,a 1,b>", "a", 0).unwrap();
        let log = record(&mut control);

        control.step().unwrap();

        let machine = machine(&control);
        assert_eq!(machine.tape().read(0), 'b');
        assert_eq!(machine.position(), 1);
        assert_eq!(machine.state(), &StateId::normalize("1"));
        assert_eq!(machine.transitions(), 1);
        assert_eq!(*log.borrow(), vec![EventKind::UiUpdate]);
    }

    #[test]
    fn test_failed_init_keeps_previous_program() {
        let mut control = TuringControl::new();
        control.init("1,a H,b>", "a", 0).unwrap();
        let before = control.export().unwrap();

        assert_eq!(
            control.init("1,a H,b\n1,a 1,c", "xyz", 5),
            Err(TuringMachineError::DuplicateTransition { line: 2 })
        );
        assert_eq!(control.export().unwrap(), before);

        control.step().unwrap();
        assert!(control.is_halted());
        assert_eq!(machine(&control).tape().read(0), 'b');
    }

    #[test]
    fn test_init_while_running() {
        let mut control = control(60_000);
        control.init(ENDLESS, "", 0).unwrap();
        control.start().unwrap();

        assert_eq!(
            control.init("1,a H,a", "", 0),
            Err(TuringMachineError::AlreadyProgramming)
        );
        control.halt().unwrap();
        assert!(control.init("1,a H,a", "", 0).is_ok());
    }

    #[test]
    fn test_halt_state_notification() {
        let mut control = TuringControl::new();
        control.init("1,a 1,b,>\n1,_ H,_", "a", 0).unwrap();
        let log = record(&mut control);

        control.step().unwrap();
        control.step().unwrap();

        assert!(control.is_halted());
        assert_eq!(
            *log.borrow(),
            vec![
                EventKind::UiUpdate,
                EventKind::HaltState,
                EventKind::UiUpdate
            ]
        );
        assert_eq!(control.step(), Err(TuringMachineError::MachineHalted));
        assert_eq!(control.start(), Err(TuringMachineError::MachineHalted));
        assert_eq!(control.compute(None), Err(TuringMachineError::MachineHalted));
    }

    #[test]
    fn test_runtime_error_is_not_a_halt_state() {
        let mut control = TuringControl::new();
        control.init("1,a 1,b>", "a", 0).unwrap();
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        control
            .events()
            .on_runtime_error(move |error| sink.borrow_mut().push(error.clone()));
        let log = record(&mut control);

        control.step().unwrap();
        control.step().unwrap();

        assert!(control.is_halted());
        assert_eq!(machine(&control).transitions(), 1);
        assert_eq!(machine(&control).last_direction(), Direction::Stay);
        assert!(!log.borrow().contains(&EventKind::HaltState));
        assert_eq!(
            *errors.borrow(),
            vec![TuringMachineError::NoMatchingTransition {
                state: StateId::initial(),
                symbol: '_',
            }]
        );
    }

    #[test]
    fn test_continuous_run() {
        let mut control = control(0);
        control.init("1,a 1,b,>\n1,b 1,a,>\n1,_ H,_", "abab", 0).unwrap();
        let log = record(&mut control);

        control.start().unwrap();
        assert!(control.is_running());
        assert_eq!(control.step(), Err(TuringMachineError::AlreadyRunning));
        assert_eq!(control.reset(), Err(TuringMachineError::AlreadyRunning));

        control.wait();

        assert!(!control.is_running());
        assert!(control.is_halted());
        assert_eq!(machine(&control).transitions(), 5);
        assert_eq!(machine(&control).tape().contents(), "baba");

        let log = log.borrow();
        let updates = log.iter().filter(|&&e| e == EventKind::UiUpdate).count();
        assert_eq!(updates, 5);
        assert_eq!(log[log.len() - 2..], [EventKind::HaltState, EventKind::UiUpdate]);
    }

    #[test]
    fn test_poll_respects_delay() {
        let mut control = control(60_000);
        control.init(ENDLESS, "", 0).unwrap();

        control.start().unwrap();
        assert_eq!(machine(&control).transitions(), 1);
        assert!(control.next_step_at().is_some());

        assert!(control.poll());
        assert_eq!(machine(&control).transitions(), 1);

        control.set_delay(Duration::ZERO);
        assert!(control.poll());
        assert_eq!(machine(&control).transitions(), 1);
    }

    #[test]
    fn test_halt_stops_run_between_steps() {
        let mut control = control(0);
        control.init(ENDLESS, "", 0).unwrap();

        control.start().unwrap();
        control.poll();
        control.poll();
        control.halt().unwrap();

        let transitions = machine(&control).transitions();
        assert_eq!(transitions, 3);
        assert!(!control.poll());
        assert_eq!(machine(&control).transitions(), transitions);
        assert!(!control.is_halted());
        assert_eq!(control.halt(), Err(TuringMachineError::NotRunning));

        // A halted run can be resumed
        control.start().unwrap();
        assert_eq!(machine(&control).transitions(), transitions + 1);
    }

    #[test]
    fn test_halt_handle_from_another_thread() {
        let mut control = control(1);
        control.init(ENDLESS, "", 0).unwrap();
        let handle = control.halt_handle();

        control.start().unwrap();
        let requester = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            handle.halt();
        });
        control.wait();
        requester.join().unwrap();

        assert!(!control.is_running());
        assert!(!control.is_halted());
        assert!(machine(&control).transitions() >= 1);
    }

    #[test]
    fn test_compute_to_halt() {
        let mut control = TuringControl::new();
        control.init("1,a 1,_,>\n1,_ H,x", &"a".repeat(5000), 0).unwrap();
        let log = record(&mut control);

        control.compute(None).unwrap();
        assert!(control.is_computing());
        assert_eq!(control.compute(None), Err(TuringMachineError::AlreadyRunning));
        control.wait();

        assert!(!control.is_running());
        assert!(control.is_halted());
        assert_eq!(machine(&control).transitions(), 5001);
        assert_eq!(machine(&control).symbols(), 1);
        assert_eq!(machine(&control).tape().contents(), "x");
        assert_eq!(
            *log.borrow(),
            vec![
                EventKind::UiUpdate,
                EventKind::SkipDone,
                EventKind::HaltState
            ]
        );
    }

    #[test]
    fn test_compute_runtime_error() {
        let mut control = TuringControl::new();
        control.init("1,a 1,a,>", "aaaa", 0).unwrap();
        let log = record(&mut control);

        control.compute(None).unwrap();
        control.wait();

        assert!(control.is_halted());
        assert_eq!(machine(&control).transitions(), 4);
        assert_eq!(
            *log.borrow(),
            vec![EventKind::UiUpdate, EventKind::RuntimeError]
        );
    }

    #[test]
    fn test_compute_timeout_keeps_machine() {
        let mut control = TuringControl::new();
        control.init(ENDLESS, "", 0).unwrap();
        let before = control.export().unwrap();
        let log = record(&mut control);

        control.compute(Some(Duration::from_millis(50))).unwrap();
        control.wait();

        assert!(!control.is_running());
        assert!(!control.is_halted());
        assert_eq!(control.export().unwrap(), before);
        assert_eq!(*log.borrow(), vec![EventKind::SkipTimeout]);
    }

    #[test]
    fn test_halt_discards_compute_result() {
        let mut control = TuringControl::new();
        control.init("1,a H,b", "a", 0).unwrap();
        let before = control.export().unwrap();
        let log = record(&mut control);

        control.compute(None).unwrap();
        // Give the worker time to finish; its result must still be dropped
        thread::sleep(Duration::from_millis(100));
        control.halt().unwrap();

        assert!(!control.poll());
        assert_eq!(control.export().unwrap(), before);
        assert!(!control.is_halted());
        assert_eq!(*log.borrow(), vec![EventKind::SkipInterrupt]);
    }

    #[test]
    fn test_lost_worker_is_a_runtime_error() {
        let mut control = TuringControl::new();
        control.init(ENDLESS, "", 0).unwrap();
        let before = control.export().unwrap();
        let log = record(&mut control);
        let errors = Rc::new(RefCell::new(Vec::new()));
        let sink = errors.clone();
        control
            .events()
            .on_runtime_error(move |e| sink.borrow_mut().push(e.clone()));

        control.compute(None).unwrap();
        control.finish_compute(ComputeOutcome::Aborted);

        assert!(!control.is_running());
        assert!(!control.is_halted());
        assert_eq!(control.export().unwrap(), before);
        assert_eq!(*log.borrow(), vec![EventKind::RuntimeError]);
        assert_eq!(*errors.borrow(), vec![TuringMachineError::ComputeAborted]);
    }

    #[test]
    fn test_init_rejects_offset_past_last_cell() {
        let mut control = TuringControl::new();

        assert_eq!(
            control.init("1,a H,b", "ab", i64::MAX),
            Err(TuringMachineError::InvalidOffset(i64::MAX.to_string()))
        );
        assert!(!control.is_programmed());

        control.init("1,a H,b", "a", i64::MAX).unwrap();
        control.step().unwrap();
        assert_eq!(machine(&control).position(), i64::MAX);
        assert_eq!(machine(&control).tape().read(i64::MAX), 'b');
    }

    #[test]
    fn test_reset_after_run() {
        let mut control = control(0);
        control.init("1,a 1,_,>\n1,_ H,_", "aa", -1).unwrap();
        control.start().unwrap();
        control.wait();
        assert!(control.is_halted());

        control.reset().unwrap();

        let machine = machine(&control);
        assert!(!machine.is_halted());
        assert_eq!(machine.position(), -1);
        assert_eq!(machine.transitions(), 0);
        assert_eq!(machine.symbols(), 2);
        assert_eq!(machine.tape().contents(), "aa");
    }

    #[test]
    fn test_export_import_round_trip() {
        let mut control = TuringControl::new();
        control.init("1,a 1,b,>\n1,b 1,a,<\n1,_ H,_", "ab", 0).unwrap();
        control.step().unwrap();

        let json = encode(&control.export().unwrap()).unwrap();
        let before = machine(&control).clone();

        let mut other = TuringControl::new();
        other.import(decode(&json).unwrap()).unwrap();
        assert_eq!(machine(&other), &before);

        // Both continue identically
        control.step().unwrap();
        other.step().unwrap();
        assert_eq!(machine(&other), machine(&control));
    }

    #[test]
    fn test_export_carries_configured_timeout() {
        let mut control = TuringControl::with_config(Config {
            timeout_ms: 1234,
            ..Config::default()
        });
        control.init("1,a H,a", "", 0).unwrap();

        assert_eq!(control.export().unwrap().default_timeout, 1234);
    }
}
