//! This module provides the `ProgramLoader` struct, responsible for loading Turing Machine
//! programs from files and directories.

use crate::parser::compile;
use crate::types::{Program, TuringMachineError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of program source files.
pub const PROGRAM_EXTENSION: &str = "tm";

/// `ProgramLoader` is a utility struct for loading Turing Machine programs.
/// It provides methods to read program text from a file, to compile a file together with an
/// initial tape, and to discover and compile all `.tm` files within a directory.
pub struct ProgramLoader;

impl ProgramLoader {
    /// Reads the program text of a file without compiling it.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` with the file content.
    /// * `Err(TuringMachineError::FileError)` if the file cannot be read.
    pub fn load_source(path: &Path) -> Result<String, TuringMachineError> {
        fs::read_to_string(path).map_err(|e| {
            TuringMachineError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })
    }

    /// Loads and compiles a single program file.
    ///
    /// # Arguments
    ///
    /// * `path` - A reference to the `Path` of the `.tm` file to load.
    /// * `initial_tape` - The initial tape content.
    /// * `offset` - The position of the first initial tape symbol.
    ///
    /// # Returns
    ///
    /// * `Ok(Program)` if the file is successfully read and compiled.
    /// * `Err(TuringMachineError::FileError)` if the file cannot be read.
    /// * Any compilation error if the file content is not a valid program.
    pub fn load_program(
        path: &Path,
        initial_tape: &str,
        offset: i64,
    ) -> Result<Program, TuringMachineError> {
        let source = Self::load_source(path)?;
        let program = compile(&source, initial_tape, offset)?;
        debug!(path = %path.display(), rules = program.table.len(), "program loaded");

        Ok(program)
    }

    /// Loads all program files (`.tm` extension) from a given directory.
    ///
    /// Each file is compiled against an empty tape. Directories and files with another
    /// extension are skipped. The results are ordered by path.
    ///
    /// # Returns
    ///
    /// * `Vec<Result<(PathBuf, Program), TuringMachineError>>` - One entry per program file,
    ///   holding either its path and compiled program or the error that prevented loading it.
    pub fn load_programs(directory: &Path) -> Vec<Result<(PathBuf, Program), TuringMachineError>> {
        let entries = match fs::read_dir(directory) {
            Ok(entries) => entries,
            Err(e) => {
                return vec![Err(TuringMachineError::FileError(format!(
                    "Failed to read directory {}: {}",
                    directory.display(),
                    e
                )))]
            }
        };

        let mut paths = Vec::new();
        let mut results = Vec::new();

        for entry in entries {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if path.is_file()
                        && path.extension().is_some_and(|ext| ext == PROGRAM_EXTENSION)
                    {
                        paths.push(path);
                    }
                }
                Err(e) => results.push(Err(TuringMachineError::FileError(format!(
                    "Failed to read directory entry: {}",
                    e
                )))),
            }
        }

        paths.sort();
        results.extend(
            paths
                .into_iter()
                .map(|path| Self::load_program(&path, "", 0).map(|program| (path, program))),
        );

        results
    }
}
