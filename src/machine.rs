//! This module defines the `TuringMachine` struct, the execution core of the simulator. It owns
//! the machine state, the tape and the compiled program, and performs single transitions.

use crate::encoder::Snapshot;
use crate::tape::Tape;
use crate::types::{
    Direction, Halt, Program, StateId, Step, TuringMachineError, DEFAULT_BLANK_SYMBOL,
    DEFAULT_TIMEOUT_MS, INPUT_BLANK_SYMBOL,
};
use tracing::trace;

/// Represents a single-tape Turing Machine.
///
/// This struct encapsulates the current state, head position, counters and tape of the machine
/// together with the program it executes. `symbols` is maintained incrementally on every write
/// and always equals the number of non-blank cells on the tape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuringMachine {
    program: Program,
    state: StateId,
    position: i64,
    transitions: u64,
    symbols: usize,
    last_direction: Direction,
    halted: bool,
    tape: Tape,
}

impl TuringMachine {
    /// Creates a new `TuringMachine` in the initial configuration of `program`.
    pub fn new(program: Program) -> Self {
        let mut machine = Self {
            program,
            state: StateId::initial(),
            position: 0,
            transitions: 0,
            symbols: 0,
            last_direction: Direction::Stay,
            halted: false,
            tape: Tape::new(),
        };
        machine.reset();
        machine
    }

    /// Resets the machine to the initial configuration of its program.
    ///
    /// The tape is rebuilt from the retained initial tape; the program text is not parsed again.
    pub fn reset(&mut self) {
        self.state = StateId::initial();
        self.position = self.program.offset;
        self.transitions = 0;
        self.symbols = self.program.initial_symbols();
        self.last_direction = Direction::Stay;
        self.halted = false;
        self.tape = Tape::new();
        self.tape.load(self.program.offset, &self.program.initial_tape);
    }

    /// Executes a single transition.
    ///
    /// # Returns
    ///
    /// * `Step::Continue` if a rule was applied and the machine did not enter the halt state.
    /// * `Step::Halt(Halt::Ok)` if a rule was applied and the machine entered the halt state.
    /// * `Step::Halt(Halt::Err(NoMatchingTransition))` if no rule matches. The machine is halted
    ///   and no counter changes.
    /// * `Step::Halt(Halt::Err(TapeBoundary))` if the rule would move the head past the last
    ///   addressable cell. The machine is halted and neither the tape nor any counter changes.
    /// * `Step::Halt(Halt::Err(MachineHalted))` if the machine had already halted. Nothing changes.
    pub fn transition(&mut self) -> Step {
        if self.halted {
            return Step::Halt(Halt::Err(TuringMachineError::MachineHalted));
        }

        let symbol = self.symbol();
        let Some(rule) = self.program.table.get(&self.state, symbol).cloned() else {
            self.halted = true;
            self.last_direction = Direction::Stay;

            return Step::Halt(Halt::Err(TuringMachineError::NoMatchingTransition {
                state: self.state.clone(),
                symbol,
            }));
        };

        let Some(next_position) = self.position.checked_add(rule.direction.offset()) else {
            self.halted = true;
            self.last_direction = Direction::Stay;

            return Step::Halt(Halt::Err(TuringMachineError::TapeBoundary {
                position: self.position,
            }));
        };

        let stored = if rule.write == INPUT_BLANK_SYMBOL {
            DEFAULT_BLANK_SYMBOL
        } else {
            rule.write
        };
        self.tape.write(self.position, stored);

        match (symbol == INPUT_BLANK_SYMBOL, rule.write == INPUT_BLANK_SYMBOL) {
            (true, false) => self.symbols += 1,
            (false, true) => self.symbols -= 1,
            _ => {}
        }

        trace!(
            state = %self.state,
            symbol = %symbol,
            next = %rule.next_state,
            position = self.position,
            "transition"
        );

        self.state = rule.next_state;
        self.position = next_position;
        self.last_direction = rule.direction;
        self.transitions += 1;

        if self.state.is_halt() {
            self.halted = true;
            return Step::Halt(Halt::Ok);
        }

        Step::Continue
    }

    /// Executes up to `budget` transitions.
    ///
    /// Returns `Step::Continue` if the budget ran out before the machine halted.
    pub fn run(&mut self, budget: u64) -> Step {
        for _ in 0..budget {
            match self.transition() {
                Step::Continue => continue,
                halt => return halt,
            }
        }

        Step::Continue
    }

    /// Returns the symbol under the head, with a blank cell reported as `INPUT_BLANK_SYMBOL`.
    pub fn symbol(&self) -> char {
        match self.tape.read(self.position) {
            DEFAULT_BLANK_SYMBOL => INPUT_BLANK_SYMBOL,
            c => c,
        }
    }

    /// Returns the current state of the Turing Machine.
    pub fn state(&self) -> &StateId {
        &self.state
    }

    /// Returns the position of the head.
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Returns the total number of transitions executed since the last reset.
    pub fn transitions(&self) -> u64 {
        self.transitions
    }

    /// Returns the number of non-blank cells on the tape.
    pub fn symbols(&self) -> usize {
        self.symbols
    }

    /// Returns the direction of the most recent head movement.
    pub fn last_direction(&self) -> Direction {
        self.last_direction
    }

    /// Checks if the machine has halted, either in the halt state or on a missing rule.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Exports a full copy of the machine.
    pub fn export(&self) -> Snapshot {
        Snapshot {
            state: self.state.clone(),
            position: self.position,
            transitions: self.transitions,
            symbols: self.symbols,
            last_direction: self.last_direction,
            halted: self.halted,
            tape: self.tape.clone(),
            program: self.program.clone(),
            halt_state: StateId::halt(),
            init_state: StateId::initial(),
            blank_symbol: INPUT_BLANK_SYMBOL,
            default_timeout: DEFAULT_TIMEOUT_MS,
        }
    }

    /// Rebuilds a machine from a snapshot.
    ///
    /// # Returns
    ///
    /// * `Err(TuringMachineError::SnapshotError)` if the snapshot uses different reserved
    ///   identifiers or blank symbol, or if its symbol count disagrees with its tape.
    pub fn import(snapshot: Snapshot) -> Result<Self, TuringMachineError> {
        if snapshot.halt_state != StateId::halt()
            || snapshot.init_state != StateId::initial()
            || snapshot.blank_symbol != INPUT_BLANK_SYMBOL
        {
            return Err(TuringMachineError::SnapshotError(format!(
                "incompatible machine: halt state {}, initial state {}, blank '{}'",
                snapshot.halt_state, snapshot.init_state, snapshot.blank_symbol
            )));
        }

        let counted = snapshot.tape.count_symbols();
        if counted != snapshot.symbols {
            return Err(TuringMachineError::SnapshotError(format!(
                "symbol count {} does not match {} symbols on tape",
                snapshot.symbols, counted
            )));
        }

        Ok(Self {
            program: snapshot.program,
            state: snapshot.state,
            position: snapshot.position,
            transitions: snapshot.transitions,
            symbols: snapshot.symbols,
            last_direction: snapshot.last_direction,
            halted: snapshot.halted,
            tape: snapshot.tape,
        })
    }
}
