//! This module provides the compiler for Turing Machine programs, utilizing the `pest` crate.
//! It defines the line grammar for transition tables and turns program text into a validated
//! `TransitionTable` with line-accurate diagnostics.

use crate::{
    analyzer::{analyze, unreachable_states, Reference},
    types::{Direction, Program, StateId, Transition, TransitionTable, TuringMachineError},
};
use pest::{
    iterators::{Pair, Pairs},
    Parser as PestParser,
};
use pest_derive::Parser as PestParser;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Derives a `PestParser` for the program line grammar defined in `grammar.pest`.
#[derive(PestParser)]
#[grammar = "grammar.pest"]
pub struct TransitionTableParser;

/// Compiles program text together with the initial tape into a `Program`.
///
/// The returned program is fully validated. Nothing is returned on failure, so a caller that
/// only replaces its active program on success never observes a partial table.
///
/// # Arguments
///
/// * `source` - The program text, one rule per line.
/// * `initial_tape` - The initial tape content, one symbol per cell.
/// * `offset` - The position of the first initial tape symbol.
///
/// # Returns
///
/// * `Err(TuringMachineError::InvalidOffset)` if the initial tape placed at `offset` runs past
///   the last addressable cell.
/// * Any error reported by [`parse`].
pub fn compile(
    source: &str,
    initial_tape: &str,
    offset: i64,
) -> Result<Program, TuringMachineError> {
    let last = i64::try_from(initial_tape.chars().count().saturating_sub(1)).unwrap_or(i64::MAX);
    if offset.checked_add(last).is_none() {
        return Err(TuringMachineError::InvalidOffset(offset.to_string()));
    }

    let table = parse(source)?;

    Ok(Program {
        table,
        initial_tape: initial_tape.to_string(),
        offset,
    })
}

/// Parses program text into a `TransitionTable`.
///
/// Blank lines and comment lines are skipped. Every other line must be a rule of the form
/// `state,read target,write[,direction]`. State identifiers are normalized before use.
///
/// # Returns
///
/// * `Ok(TransitionTable)` if every line is well formed and the table passes analysis.
/// * `Err(TuringMachineError::SyntaxError)` for a malformed line.
/// * `Err(TuringMachineError::HaltOverride)` for a rule defined on the halt state.
/// * `Err(TuringMachineError::DuplicateTransition)` for a repeated `(state, read)` pair.
/// * Any error reported by [`analyze`].
pub fn parse(source: &str) -> Result<TransitionTable, TuringMachineError> {
    let mut table = TransitionTable::default();
    let mut references = Vec::new();
    let mut referenced = HashSet::new();

    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        let Some(command) = parse_line(text, line)? else {
            continue;
        };

        if command.state.is_halt() {
            return Err(TuringMachineError::HaltOverride { line });
        }

        let transition = Transition {
            write: command.write,
            direction: command.direction,
            next_state: command.next_state.clone(),
        };

        // First occurrence wins
        if !table.insert(command.state, command.read, transition) {
            return Err(TuringMachineError::DuplicateTransition { line });
        }

        if referenced.insert(command.next_state.clone()) {
            references.push(Reference {
                state: command.next_state,
                line,
            });
        }
    }

    analyze(&table, &references)?;

    for state in unreachable_states(&table) {
        warn!(%state, "state is unreachable from the initial state");
    }

    Ok(table)
}

/// Parses an initial tape offset as entered by a user.
///
/// An empty string means offset `0`. Anything that is not a finite integer is rejected.
pub fn parse_offset(input: &str) -> Result<i64, TuringMachineError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }

    trimmed
        .parse::<i64>()
        .map_err(|_| TuringMachineError::InvalidOffset(input.to_string()))
}

/// Parses a single program line.
///
/// Returns `Ok(None)` for blank and comment lines.
fn parse_line(text: &str, line: usize) -> Result<Option<ParsedCommand>, TuringMachineError> {
    let mut pairs = TransitionTableParser::parse(Rule::line, text).map_err(|e| {
        debug!(line, error = %e, "rejected program line");
        TuringMachineError::SyntaxError { line }
    })?;

    let root = pairs
        .next()
        .ok_or(TuringMachineError::SyntaxError { line })?;

    root.into_inner()
        .find(|pair| pair.as_rule() == Rule::command)
        .map(|pair| parse_command(pair, line))
        .transpose()
}

/// Extracts the parts of a `Rule::command` pair.
fn parse_command(pair: Pair<Rule>, line: usize) -> Result<ParsedCommand, TuringMachineError> {
    let mut pairs = pair.into_inner();

    let state = StateId::normalize(parse_string(&mut pairs, line)?);
    let read = parse_symbol(parse_string(&mut pairs, line)?, line)?;
    let next_state = StateId::normalize(parse_string(&mut pairs, line)?);
    let write = parse_symbol(parse_string(&mut pairs, line)?, line)?;

    // Direction is optional and defaults to no move
    let direction = match pairs.next() {
        Some(marker) => Direction::from_marker(marker.as_str())
            .ok_or(TuringMachineError::SyntaxError { line })?,
        None => Direction::Stay,
    };

    Ok(ParsedCommand {
        state,
        read,
        next_state,
        write,
        direction,
    })
}

/// Extracts the string content from the current `Pair` in a `Pairs` iterator.
fn parse_string<'i>(
    pairs: &mut Pairs<'i, Rule>,
    line: usize,
) -> Result<&'i str, TuringMachineError> {
    pairs
        .next()
        .map(|pair| pair.as_str())
        .ok_or(TuringMachineError::SyntaxError { line })
}

/// Parses a single character symbol.
fn parse_symbol(input: &str, line: usize) -> Result<char, TuringMachineError> {
    input
        .chars()
        .next()
        .ok_or(TuringMachineError::SyntaxError { line })
}

/// A helper struct to temporarily hold one parsed rule line.
struct ParsedCommand {
    state: StateId,
    read: char,
    next_state: StateId,
    write: char,
    direction: Direction,
}
