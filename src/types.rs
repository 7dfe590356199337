//! This module defines the core data structures and types used throughout the Turing Machine
//! simulator, including state identifiers, the compiled transition table, execution results,
//! and error types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// The character stored on the tape for an empty cell.
pub const DEFAULT_BLANK_SYMBOL: char = ' ';
/// The symbol used in program text and on the initial tape to represent an empty cell.
pub const INPUT_BLANK_SYMBOL: char = '_';
/// The reserved state that terminates execution once entered.
pub const HALT_STATE: &str = "H";
/// The state every program starts in.
pub const INIT_STATE: &str = "1";
/// Default time budget for an isolated computation, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10000;
/// Default pause between two steps of a continuous run, in milliseconds.
pub const DEFAULT_DELAY_MS: u64 = 100;

/// A normalized state identifier.
///
/// Identifiers are case-insensitive and ignore up to two leading zeros, so `"001"`, `"01"`
/// and `"1"` all denote the same state. Only two zeros are stripped: `"0"` and `"00"` both
/// become the empty identifier, while `"000"` becomes `"0"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    /// Normalizes a raw identifier as written in program text.
    pub fn normalize(raw: &str) -> Self {
        let mut id = raw;
        for _ in 0..2 {
            if let Some(rest) = id.strip_prefix('0') {
                id = rest;
            }
        }

        StateId(id.to_ascii_uppercase())
    }

    /// The reserved halt state.
    pub fn halt() -> Self {
        StateId(HALT_STATE.to_string())
    }

    /// The mandatory entry state.
    pub fn initial() -> Self {
        StateId(INIT_STATE.to_string())
    }

    pub fn is_halt(&self) -> bool {
        self.0 == HALT_STATE
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Represents the possible directions a Turing Machine head can move.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Move the head one position to the left.
    Left,
    /// Keep the head in the same position.
    #[default]
    Stay,
    /// Move the head one position to the right.
    Right,
}

impl Direction {
    /// Maps a direction marker from program text (`<`, `_`, `>`) to a direction.
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker {
            "<" => Some(Direction::Left),
            "_" => Some(Direction::Stay),
            ">" => Some(Direction::Right),
            _ => None,
        }
    }

    /// The change applied to the head position.
    pub fn offset(self) -> i64 {
        match self {
            Direction::Left => -1,
            Direction::Stay => 0,
            Direction::Right => 1,
        }
    }
}

/// Represents a single compiled transition rule.
///
/// A rule is selected by the current state and the symbol under the head; it names the
/// symbol to write, the head movement and the next state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    /// The symbol written to the current cell. `INPUT_BLANK_SYMBOL` erases the cell.
    pub write: char,
    /// The direction the head moves after writing.
    pub direction: Direction,
    /// The state the machine transitions to.
    pub next_state: StateId,
}

/// The compiled mapping from `(state, symbol)` to the rule executed next.
///
/// Keys are unique: the compiler refuses to overwrite an existing rule. The table is built once
/// per program and replaced wholesale on recompilation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionTable(HashMap<StateId, HashMap<char, Transition>>);

impl TransitionTable {
    /// Looks up the rule for `state` reading `symbol`.
    pub fn get(&self, state: &StateId, symbol: char) -> Option<&Transition> {
        self.0.get(state).and_then(|rules| rules.get(&symbol))
    }

    /// Returns every rule defined for `state`, keyed by the symbol read.
    pub fn rules(&self, state: &StateId) -> Option<&HashMap<char, Transition>> {
        self.0.get(state)
    }

    /// Checks if at least one rule is defined for `state`.
    pub fn contains_state(&self, state: &StateId) -> bool {
        self.0.get(state).is_some_and(|rules| !rules.is_empty())
    }

    /// Iterates over all states that have rules.
    pub fn states(&self) -> impl Iterator<Item = &StateId> {
        self.0.keys()
    }

    /// Number of states that have rules.
    pub fn state_count(&self) -> usize {
        self.0.len()
    }

    /// Total number of rules.
    pub fn len(&self) -> usize {
        self.0.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Inserts a rule unless one already exists for the same key.
    ///
    /// Returns `false` and leaves the table untouched when the key is taken.
    pub(crate) fn insert(&mut self, state: StateId, symbol: char, transition: Transition) -> bool {
        let rules = self.0.entry(state).or_default();
        if rules.contains_key(&symbol) {
            return false;
        }

        rules.insert(symbol, transition);
        true
    }
}

/// A compiled Turing Machine program.
///
/// Besides the transition table, the program retains the initial tape and its offset so the
/// machine can be reset without re-parsing the source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// The compiled transition rules.
    pub table: TransitionTable,
    /// The initial content of the tape, one symbol per cell.
    pub initial_tape: String,
    /// Position of the first initial tape symbol, which is also the initial head position.
    pub offset: i64,
}

impl Program {
    /// Number of non-blank symbols on the initial tape.
    pub fn initial_symbols(&self) -> usize {
        self.initial_tape
            .chars()
            .filter(|&c| c != DEFAULT_BLANK_SYMBOL && c != INPUT_BLANK_SYMBOL)
            .count()
    }
}

/// Represents the outcome of a Turing Machine execution step.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The machine successfully performed a step and continues execution.
    Continue,
    /// The machine has halted.
    Halt(Halt),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Halt {
    /// Halted by entering the halt state.
    Ok,

    Err(TuringMachineError),
}

/// Represents various errors that can occur during Turing Machine operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TuringMachineError {
    /// A program was installed while the machine was running.
    #[error("Cannot install program while running!")]
    AlreadyProgramming,
    /// A program line does not follow the rule grammar.
    #[error("Syntax error in line {line}.")]
    SyntaxError { line: usize },
    /// A program line defines a rule for the halt state.
    #[error("Attempting to override halt state in line {line}!")]
    HaltOverride { line: usize },
    /// A program line repeats an existing `(state, symbol)` pair.
    #[error("Trying to override existing state transition in line {line}!")]
    DuplicateTransition { line: usize },
    /// The program text contains no rules.
    #[error("No program code entered.")]
    EmptyProgram,
    /// A rule transitions to a state that has no rules and is not the halt state.
    #[error("Potential call to undefined state {state} in line {line}!")]
    UndefinedState { state: StateId, line: usize },
    /// The initial state has no rules.
    #[error("No transition rules found for initial state {state}.")]
    NoInitialTransitions { state: StateId },
    /// An operation needs a compiled program.
    #[error("TMS has not been programmed yet!")]
    NotProgrammed,
    /// An operation needs a running machine.
    #[error("Not running!")]
    NotRunning,
    /// An operation needs an idle machine.
    #[error("Already running!")]
    AlreadyRunning,
    /// An operation needs a machine that has not halted.
    #[error("Halt state reached.")]
    MachineHalted,
    /// The isolated execution context could not be created.
    #[error("This feature is not supported by your environment.")]
    UnsupportedEnvironment,
    /// No rule exists for the current state and the symbol under the head.
    #[error("No applicable transition found for '{symbol}' in state {state}.")]
    NoMatchingTransition { state: StateId, symbol: char },
    /// The head would move past the last addressable cell.
    #[error("Head cannot move beyond position {position}.")]
    TapeBoundary { position: i64 },
    /// An isolated computation ended without reporting a result.
    #[error("Computation stopped without a result.")]
    ComputeAborted,
    /// The initial tape offset is not a finite integer, or the tape would not fit after it.
    #[error("Invalid offset specified: {0}")]
    InvalidOffset(String),
    /// Indicates an error related to file system operations, such as reading program files.
    #[error("File error: {0}")]
    FileError(String),
    /// The engine configuration could not be read.
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// A serialized machine state is malformed or incompatible with this engine.
    #[error("Snapshot error: {0}")]
    SnapshotError(String),
    /// No catalogue program matches the requested name or index.
    #[error("Program {0} not found")]
    ProgramNotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_normalization() {
        assert_eq!(StateId::normalize("001"), StateId::normalize("1"));
        assert_eq!(StateId::normalize("01").as_str(), "1");
        assert_eq!(StateId::normalize("abc").as_str(), "ABC");
        assert_eq!(StateId::normalize("0a").as_str(), "A");
        assert_eq!(StateId::normalize("100").as_str(), "100");
    }

    #[test]
    fn test_state_normalization_strips_two_zeros_at_most() {
        assert_eq!(StateId::normalize("0").as_str(), "");
        assert_eq!(StateId::normalize("00").as_str(), "");
        assert_eq!(StateId::normalize("000").as_str(), "0");
        assert_ne!(StateId::normalize("0"), StateId::normalize("000"));
    }

    #[test]
    fn test_reserved_states() {
        assert!(StateId::normalize("h").is_halt());
        assert!(StateId::normalize("00h").is_halt());
        assert_eq!(StateId::initial(), StateId::normalize("001"));
    }

    #[test]
    fn test_direction_serialization() {
        let left = Direction::Left;
        let right = Direction::Right;

        let left_json = serde_json::to_string(&left).unwrap();
        let right_json = serde_json::to_string(&right).unwrap();

        assert_eq!(left_json, "\"Left\"");
        assert_eq!(right_json, "\"Right\"");

        let left_deserialized: Direction = serde_json::from_str(&left_json).unwrap();
        assert_eq!(left, left_deserialized);
    }

    #[test]
    fn test_direction_markers() {
        assert_eq!(Direction::from_marker("<"), Some(Direction::Left));
        assert_eq!(Direction::from_marker("_"), Some(Direction::Stay));
        assert_eq!(Direction::from_marker(">"), Some(Direction::Right));
        assert_eq!(Direction::from_marker("R"), None);
        assert_eq!(Direction::Left.offset(), -1);
    }

    #[test]
    fn test_table_refuses_overwrite() {
        let mut table = TransitionTable::default();
        let rule = Transition {
            write: 'b',
            direction: Direction::Right,
            next_state: StateId::initial(),
        };

        assert!(table.insert(StateId::initial(), 'a', rule.clone()));
        assert!(!table.insert(
            StateId::initial(),
            'a',
            Transition {
                write: 'c',
                ..rule.clone()
            }
        ));
        assert_eq!(table.get(&StateId::initial(), 'a'), Some(&rule));
        assert_eq!(table.len(), 1);
        assert_eq!(table.state_count(), 1);
    }

    #[test]
    fn test_initial_symbols_ignore_blanks() {
        let program = Program {
            initial_tape: "a b_c".to_string(),
            ..Program::default()
        };

        assert_eq!(program.initial_symbols(), 3);
    }

    #[test]
    fn test_error_display() {
        let error = TuringMachineError::UndefinedState {
            state: StateId::normalize("2"),
            line: 4,
        };

        let error_msg = format!("{}", error);
        assert_eq!(error_msg, "Potential call to undefined state 2 in line 4!");
    }
}
