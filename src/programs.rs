//! Embedded catalogue of demonstration programs.
//!
//! Each demo is an ordinary program file whose leading comments carry its metadata:
//!
//! ```text
//! # name: Binary increment
//! # tape: 1011
//! # offset: 0
//! ```
//!
//! The headers are comments, so the text compiles unchanged.

use crate::parser::{compile, parse_offset};
use crate::types::{Program, TuringMachineError};
use tracing::warn;

// Default embedded programs
const PROGRAM_TEXTS: [&str; 3] = [
    include_str!("../demos/binary-increment.tm"),
    include_str!("../demos/unary-addition.tm"),
    include_str!("../demos/busy-beaver.tm"),
];

lazy_static::lazy_static! {
    pub static ref PROGRAMS: Vec<Demo> = PROGRAM_TEXTS
        .into_iter()
        .filter_map(|source| match Demo::from_source(source) {
            Ok(demo) => Some(demo),
            Err(e) => {
                warn!("Failed to read demo program: {e}");
                None
            }
        })
        .collect();
}

/// A catalogue entry: program text plus the tape it is meant to run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Demo {
    pub name: String,
    pub source: &'static str,
    pub initial_tape: String,
    pub offset: i64,
}

impl Demo {
    /// Reads the `# name:`, `# tape:` and `# offset:` headers of a program text.
    ///
    /// Headers are only recognized in the comment block at the top of the text. Missing headers
    /// default to an untitled program on an empty tape at offset 0.
    pub fn from_source(source: &'static str) -> Result<Self, TuringMachineError> {
        let mut demo = Self {
            name: "Untitled".to_string(),
            source,
            initial_tape: String::new(),
            offset: 0,
        };

        let headers = source
            .lines()
            .map(str::trim)
            .take_while(|line| line.starts_with('#'))
            .filter_map(|line| line.trim_start_matches('#').split_once(':'));

        for (key, value) in headers {
            let value = value.trim();
            match key.trim() {
                "name" => demo.name = value.to_string(),
                "tape" => demo.initial_tape = value.to_string(),
                "offset" => demo.offset = parse_offset(value)?,
                _ => {}
            }
        }

        Ok(demo)
    }

    /// Compiles the demo against its own tape and offset.
    pub fn compile(&self) -> Result<Program, TuringMachineError> {
        compile(self.source, &self.initial_tape, self.offset)
    }
}

/// Summary of a catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramInfo {
    pub name: String,
    pub initial_tape: String,
    pub offset: i64,
    pub state_count: usize,
    pub transition_count: usize,
}

pub struct ProgramManager;

impl ProgramManager {
    /// Get the number of available programs
    pub fn get_program_count() -> usize {
        PROGRAMS.len()
    }

    /// Get a program by its index
    pub fn get_program_by_index(index: usize) -> Result<&'static Demo, TuringMachineError> {
        PROGRAMS
            .get(index)
            .ok_or_else(|| TuringMachineError::ProgramNotFound(format!("#{index}")))
    }

    /// Get a program by its name, ignoring case
    pub fn get_program_by_name(name: &str) -> Result<&'static Demo, TuringMachineError> {
        PROGRAMS
            .iter()
            .find(|demo| demo.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| TuringMachineError::ProgramNotFound(format!("'{name}'")))
    }

    /// List all program names
    pub fn list_program_names() -> Vec<String> {
        PROGRAMS.iter().map(|demo| demo.name.clone()).collect()
    }

    /// Get information about a program by its index
    pub fn get_program_info(index: usize) -> Result<ProgramInfo, TuringMachineError> {
        let demo = Self::get_program_by_index(index)?;
        let program = demo.compile()?;

        Ok(ProgramInfo {
            name: demo.name.clone(),
            initial_tape: demo.initial_tape.clone(),
            offset: demo.offset,
            state_count: program.table.state_count(),
            transition_count: program.table.len(),
        })
    }

    /// Search for programs by name
    pub fn search_programs(query: &str) -> Vec<usize> {
        let query = query.to_lowercase();

        PROGRAMS
            .iter()
            .enumerate()
            .filter(|(_, demo)| demo.name.to_lowercase().contains(&query))
            .map(|(index, _)| index)
            .collect()
    }
}
