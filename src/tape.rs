//! This module provides the tape store: an unbounded, sparse, two-directional tape holding one
//! character per integer position.

use crate::types::{DEFAULT_BLANK_SYMBOL, INPUT_BLANK_SYMBOL};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A sparse tape addressed by signed positions.
///
/// Non-negative positions live in `right`, indexed by the position itself. Negative positions
/// live in `left`, indexed by the one's complement of the position (`-1` is stored at `0`,
/// `-2` at `1`, and so on). Unset cells read as `DEFAULT_BLANK_SYMBOL`. Writing a blank stores
/// an explicit blank; cells are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tape {
    left: BTreeMap<usize, char>,
    right: BTreeMap<usize, char>,
}

impl Tape {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the cell at `position`.
    pub fn read(&self, position: i64) -> char {
        let cell = if position < 0 {
            self.left.get(&(!position as usize))
        } else {
            self.right.get(&(position as usize))
        };

        cell.copied().unwrap_or(DEFAULT_BLANK_SYMBOL)
    }

    /// Writes `value` to the cell at `position`.
    pub fn write(&mut self, position: i64, value: char) {
        if position < 0 {
            self.left.insert(!position as usize, value);
        } else {
            self.right.insert(position as usize, value);
        }
    }

    /// Writes `content` one symbol per cell starting at `offset`.
    ///
    /// `INPUT_BLANK_SYMBOL` is stored as a real blank.
    ///
    /// Symbols that would land past `i64::MAX` are dropped.
    pub fn load(&mut self, offset: i64, content: &str) {
        let positions = (0..).map_while(|i| offset.checked_add(i));
        for (position, c) in positions.zip(content.chars()) {
            let value = if c == INPUT_BLANK_SYMBOL {
                DEFAULT_BLANK_SYMBOL
            } else {
                c
            };
            self.write(position, value);
        }
    }

    /// Returns the leftmost and rightmost positions ever written, if any.
    pub fn bounds(&self) -> Option<(i64, i64)> {
        let start = match self.left.last_key_value() {
            Some((&index, _)) => !(index as i64),
            None => *self.right.first_key_value()?.0 as i64,
        };
        let end = match self.right.last_key_value() {
            Some((&index, _)) => index as i64,
            None => !(*self.left.first_key_value()?.0 as i64),
        };

        Some((start, end))
    }

    /// Renders the cells from `from` to `to` (inclusive).
    pub fn window(&self, from: i64, to: i64) -> String {
        (from..=to).map(|position| self.read(position)).collect()
    }

    /// Renders the written part of the tape with surrounding blanks trimmed.
    pub fn contents(&self) -> String {
        self.bounds()
            .map(|(start, end)| self.window(start, end))
            .unwrap_or_default()
            .trim_matches(DEFAULT_BLANK_SYMBOL)
            .to_string()
    }

    /// Counts non-blank cells by scanning the whole tape.
    pub fn count_symbols(&self) -> usize {
        self.left
            .values()
            .chain(self.right.values())
            .filter(|&&c| c != DEFAULT_BLANK_SYMBOL)
            .count()
    }
}
