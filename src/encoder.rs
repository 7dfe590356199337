//! This module defines the serialized form of a machine, used to hand a machine over to an
//! isolated execution context and back, and its JSON encoding.

use crate::tape::Tape;
use crate::types::{Direction, Program, StateId, TuringMachineError};
use serde::{Deserialize, Serialize};

/// A complete, self-contained copy of a machine.
///
/// The first group of fields is the dynamic machine state, the second group the static program
/// metadata. Importing a snapshot reproduces the exported machine exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: StateId,
    pub position: i64,
    pub transitions: u64,
    pub symbols: usize,
    pub last_direction: Direction,
    pub halted: bool,
    pub tape: Tape,

    pub program: Program,
    pub halt_state: StateId,
    pub init_state: StateId,
    pub blank_symbol: char,
    /// Default compute timeout in milliseconds.
    pub default_timeout: u64,
}

/// Encodes a snapshot as JSON.
pub fn encode(snapshot: &Snapshot) -> Result<String, TuringMachineError> {
    serde_json::to_string(snapshot).map_err(|e| TuringMachineError::SnapshotError(e.to_string()))
}

/// Decodes a snapshot from JSON.
pub fn decode(input: &str) -> Result<Snapshot, TuringMachineError> {
    serde_json::from_str(input).map_err(|e| TuringMachineError::SnapshotError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::TuringMachine;
    use crate::parser::compile;

    #[test]
    fn test_encode_decode_mid_run() {
        let program = compile("1,a 1,_,<\n1,_ 2,x,<\n2,_ H,y", "aa", 0).unwrap();
        let mut machine = TuringMachine::new(program);
        machine.transition();
        machine.transition();

        let snapshot = machine.export();
        let decoded = decode(&encode(&snapshot).unwrap()).unwrap();

        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.position, -2);
        assert_eq!(decoded.tape.read(-1), 'x');
    }

    #[test]
    fn test_encoded_fields() {
        let program = compile("1,a H,b", "a", 0).unwrap();
        let machine = TuringMachine::new(program);

        let json: serde_json::Value =
            serde_json::from_str(&encode(&machine.export()).unwrap()).unwrap();

        assert_eq!(json["state"], "1");
        assert_eq!(json["halt_state"], "H");
        assert_eq!(json["init_state"], "1");
        assert_eq!(json["blank_symbol"], "_");
        assert_eq!(json["last_direction"], "Stay");
        assert_eq!(json["program"]["table"]["1"]["a"]["write"], "b");
        assert_eq!(json["tape"]["right"]["0"], "a");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode("{\"state\": 1}"),
            Err(TuringMachineError::SnapshotError(_))
        ));
    }
}
