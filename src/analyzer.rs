//! This module provides the checks run on a freshly parsed transition table before it is
//! accepted: the program must not be empty, every referenced state must be defined, and the
//! initial state must have rules. It also offers a non-fatal reachability lint.

use crate::types::{StateId, TransitionTable, TuringMachineError};
use std::collections::HashSet;

/// A state referenced as a transition target, with the first line that referenced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub state: StateId,
    pub line: usize,
}

/// Represents the errors that can be found during the analysis of a transition table.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum AnalysisError {
    /// The program contains no rules at all.
    EmptyProgram,
    /// A transition targets a state that has no rules and is not the halt state.
    UndefinedState(Reference),
    /// The initial state has no rules.
    InvalidStartState(StateId),
}

impl From<AnalysisError> for TuringMachineError {
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::EmptyProgram => TuringMachineError::EmptyProgram,
            AnalysisError::UndefinedState(Reference { state, line }) => {
                TuringMachineError::UndefinedState { state, line }
            }
            AnalysisError::InvalidStartState(state) => {
                TuringMachineError::NoInitialTransitions { state }
            }
        }
    }
}

type Check = fn(&TransitionTable, &[Reference]) -> Result<(), AnalysisError>;

/// Analyzes a parsed transition table.
///
/// Checks run in a fixed order and the first failure is reported.
///
/// # Arguments
///
/// * `table` - The parsed transition table.
/// * `references` - Every target state in order of first reference.
///
/// # Returns
///
/// * `Ok(())` if no errors are found.
/// * `Err(TuringMachineError)` for the first violated rule.
pub fn analyze(
    table: &TransitionTable,
    references: &[Reference],
) -> Result<(), TuringMachineError> {
    let checks: [Check; 3] = [check_not_empty, check_undefined_states, check_initial_state];

    checks
        .iter()
        .find_map(|check| check(table, references).err())
        .map_or(Ok(()), |error| Err(error.into()))
}

fn check_not_empty(table: &TransitionTable, _: &[Reference]) -> Result<(), AnalysisError> {
    if table.is_empty() {
        return Err(AnalysisError::EmptyProgram);
    }

    Ok(())
}

/// Checks that all referenced target states are either defined or the halt state.
fn check_undefined_states(
    table: &TransitionTable,
    references: &[Reference],
) -> Result<(), AnalysisError> {
    references
        .iter()
        .find(|reference| !reference.state.is_halt() && !table.contains_state(&reference.state))
        .map_or(Ok(()), |reference| {
            Err(AnalysisError::UndefinedState(reference.clone()))
        })
}

/// Checks that the initial state has at least one rule.
fn check_initial_state(table: &TransitionTable, _: &[Reference]) -> Result<(), AnalysisError> {
    let initial = StateId::initial();
    if !table.contains_state(&initial) {
        return Err(AnalysisError::InvalidStartState(initial));
    }

    Ok(())
}

/// Returns the states with rules that cannot be reached from the initial state.
///
/// Performs a depth-first traversal starting at the initial state. The result is sorted.
pub fn unreachable_states(table: &TransitionTable) -> Vec<StateId> {
    let mut visited = HashSet::new();
    let mut queue = vec![StateId::initial()];

    while let Some(state) = queue.pop() {
        if !visited.insert(state.clone()) {
            continue;
        }

        if let Some(rules) = table.rules(&state) {
            for transition in rules.values() {
                if !visited.contains(&transition.next_state) {
                    queue.push(transition.next_state.clone());
                }
            }
        }
    }

    let mut unreachable: Vec<StateId> = table
        .states()
        .filter(|state| !visited.contains(*state))
        .cloned()
        .collect();
    unreachable.sort();

    unreachable
}
