//! Engine configuration.

use crate::types::{TuringMachineError, DEFAULT_DELAY_MS, DEFAULT_TIMEOUT_MS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Timing settings of an engine.
///
/// Missing fields take their default value, so a partial file such as `{"delay_ms": 0}` is
/// accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pause between two steps of a continuous run, in milliseconds.
    pub delay_ms: u64,
    /// Time budget of an isolated computation when none is given, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            delay_ms: DEFAULT_DELAY_MS,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Config {
    pub fn from_json(input: &str) -> Result<Self, TuringMachineError> {
        serde_json::from_str(input).map_err(|e| TuringMachineError::ConfigError(e.to_string()))
    }

    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self, TuringMachineError> {
        let content = fs::read_to_string(path).map_err(|e| {
            TuringMachineError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;

        Self::from_json(&content)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
