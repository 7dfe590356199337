//! This crate provides the core logic for a single-tape Turing Machine simulator.
//! It includes modules for compiling transition-table programs, executing them step by step
//! or to completion in an isolated worker, notifying listeners about machine activity, and
//! managing a collection of predefined programs.

pub mod analyzer;
pub mod config;
pub mod control;
pub mod encoder;
pub mod events;
pub mod loader;
pub mod machine;
pub mod parser;
pub mod programs;
pub mod tape;
pub mod types;
pub mod worker;

/// Re-exports the `Rule` enum from the parser module, used by the `pest` grammar.
pub use crate::parser::Rule;
/// Re-exports the `analyze` function and `AnalysisError` enum from the analyzer module.
pub use analyzer::{analyze, AnalysisError};
/// Re-exports the engine configuration.
pub use config::Config;
/// Re-exports the host-facing engine and its cancellation handle.
pub use control::{HaltHandle, TuringControl};
/// Re-exports the snapshot type and its JSON encoding functions.
pub use encoder::{decode, encode, Snapshot};
/// Re-exports the notification layer.
pub use events::{EventKind, Events, Subscription};
/// Re-exports the `ProgramLoader` struct from the loader module.
pub use loader::ProgramLoader;
/// Re-exports the `TuringMachine` struct from the machine module.
pub use machine::TuringMachine;
/// Re-exports the compiler entry points from the parser module.
pub use parser::{compile, parse, parse_offset};
/// Re-exports `ProgramInfo`, `ProgramManager`, and `PROGRAMS` from the programs module.
pub use programs::{Demo, ProgramInfo, ProgramManager, PROGRAMS};
/// Re-exports the tape store.
pub use tape::Tape;
/// Re-exports various types related to Turing Machine definition and execution from the types
/// module.
pub use types::{
    Direction, Halt, Program, StateId, Step, Transition, TransitionTable, TuringMachineError,
    DEFAULT_BLANK_SYMBOL, HALT_STATE, INIT_STATE, INPUT_BLANK_SYMBOL,
};
/// Re-exports the isolated computation handle and its outcome.
pub use worker::{ComputeJob, ComputeOutcome};
