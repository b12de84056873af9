//! # Scenario script interpreter module
//!
//! This module provides an interpreter for scenario scripts, which schedule
//! scenario commands at points in simulated time. Each statement in a script
//! has the form `<time_s>: <json command>;`, for example:
//!
//! ```text
//! 0.0: {"type": "SET_CRUISE", "payload": {"v_cruise_kph": 100.0}};
//! 0.5: {"type": "ENGAGE"};
//! ```
//!
//! Anything not matching this form (such as comment lines) is ignored.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use regex::RegexBuilder;
use thiserror::Error;

// Internal
use comms_if::scenario::{ScenarioCmd, ScenarioParseError};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A command which is scripted to occur at a specific time.
#[derive(Debug, Clone)]
struct Command {
    /// The time the command is supposed to execute at
    exec_time_s: f64,

    cmd: ScenarioCmd,
}

/// A script interpreter.
///
/// After loading a script use `.get_pending_cmds` to acquire the commands
/// which are due at the current simulated time.
#[derive(Debug)]
pub struct ScriptInterpreter {
    script_path: Option<PathBuf>,
    cmds: VecDeque<Command>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Could not find the script at {0:?}")]
    ScriptNotFound(PathBuf),

    #[error("Could not load the script: {0}")]
    ScriptLoadError(std::io::Error),

    #[error("The script is empty (or is so bad it can't be read)")]
    ScriptEmpty,

    #[error(
        "Script contains an invalid timestamp: {0}. \
        Should be a float (like 1.0)")]
    InvalidTimestamp(String),

    #[error("Script timestamps must not decrease, found {0} s after {1} s")]
    OutOfOrder(f64, f64),

    #[error("Script contains an invalid command at {0} s: {1}")]
    InvalidCmd(f64, ScenarioParseError),
}

/// Result of polling the interpreter.
#[derive(Debug, PartialEq)]
pub enum PendingCmds {
    None,
    Some(Vec<ScenarioCmd>),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ScriptInterpreter {

    /// Create a new interpreter from the given script path.
    pub fn new<P: AsRef<Path>>(script_path: P) -> Result<Self, ScriptError> {
        let path = PathBuf::from(script_path.as_ref());

        if !path.exists() {
            return Err(ScriptError::ScriptNotFound(path));
        }

        let script = fs::read_to_string(&path)
            .map_err(ScriptError::ScriptLoadError)?;

        let mut interp = Self::from_str(&script)?;
        interp.script_path = Some(path);

        Ok(interp)
    }

    /// Create a new interpreter from the contents of a script.
    pub fn from_str(script: &str) -> Result<Self, ScriptError> {
        let mut cmd_queue: VecDeque<Command> = VecDeque::new();

        // Go through the script executing __the magic regex__.
        let re = RegexBuilder::new(r"^\s*(\d+(\.\d+)?)\s*:\s*([^;]*);")
            .multi_line(true)
            .build()
            .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

        for cap in re.captures_iter(script) {
            // Both groups are mandatory in the pattern
            let (time_str, payload) = match (cap.get(1), cap.get(3)) {
                (Some(t), Some(p)) => (t.as_str(), p.as_str()),
                _ => continue,
            };

            let exec_time_s: f64 = time_str
                .parse()
                .map_err(|e| ScriptError::InvalidTimestamp(format!("{}", e)))?;

            if let Some(last) = cmd_queue.back() {
                if exec_time_s < last.exec_time_s {
                    return Err(ScriptError::OutOfOrder(exec_time_s, last.exec_time_s));
                }
            }

            let cmd = ScenarioCmd::from_json(payload)
                .map_err(|e| ScriptError::InvalidCmd(exec_time_s, e))?;

            cmd_queue.push_back(Command { exec_time_s, cmd });
        }

        if cmd_queue.is_empty() {
            return Err(ScriptError::ScriptEmpty);
        }

        Ok(ScriptInterpreter {
            script_path: None,
            cmds: cmd_queue,
        })
    }

    /// Return the commands due at or before `current_time_s`.
    pub fn get_pending_cmds(&mut self, current_time_s: f64) -> PendingCmds {

        // If the queue is empty the script is over
        if self.cmds.is_empty() {
            return PendingCmds::EndOfScript;
        }

        let mut cmd_vec: Vec<ScenarioCmd> = vec![];

        while let Some(front) = self.cmds.front() {
            if front.exec_time_s > current_time_s {
                break;
            }
            if let Some(c) = self.cmds.pop_front() {
                cmd_vec.push(c.cmd);
            }
        }

        if cmd_vec.is_empty() {
            PendingCmds::None
        }
        else {
            PendingCmds::Some(cmd_vec)
        }
    }

    /// Get the number of commands left in the script
    pub fn get_num_cmds(&self) -> usize {
        self.cmds.len()
    }

    /// Get the time of the last command in the script
    pub fn get_duration(&self) -> f64 {
        match self.cmds.back() {
            Some(c) => c.exec_time_s,
            None => 0f64,
        }
    }

    pub fn script_path(&self) -> Option<&Path> {
        self.script_path.as_deref()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const SCRIPT: &str = r#"
        # Cruise then engage
        0.0: {"type": "SET_CRUISE", "payload": {"v_cruise_kph": 90.0}};
        0.5: {"type": "ENGAGE"};
        0.5: {"type": "BRAKE", "payload": {"pressed": false}};
        2.0: {"type": "DISENGAGE"};
    "#;

    #[test]
    fn test_pending_cmds() {
        let mut interp = ScriptInterpreter::from_str(SCRIPT).unwrap();
        assert_eq!(interp.get_num_cmds(), 4);
        assert_eq!(interp.get_duration(), 2.0);

        assert_eq!(
            interp.get_pending_cmds(0.0),
            PendingCmds::Some(vec![ScenarioCmd::SetCruise { v_cruise_kph: 90.0 }])
        );
        assert_eq!(interp.get_pending_cmds(0.25), PendingCmds::None);

        match interp.get_pending_cmds(0.5) {
            PendingCmds::Some(v) => assert_eq!(v.len(), 2),
            p => panic!("Expected two commands, got {:?}", p),
        }

        assert_eq!(
            interp.get_pending_cmds(10.0),
            PendingCmds::Some(vec![ScenarioCmd::Disengage])
        );
        assert_eq!(interp.get_pending_cmds(10.0), PendingCmds::EndOfScript);
    }

    #[test]
    fn test_script_errors() {
        assert!(matches!(
            ScriptInterpreter::from_str("# nothing here"),
            Err(ScriptError::ScriptEmpty)
        ));
        assert!(matches!(
            ScriptInterpreter::from_str(r#"1.0: {"type": "NOPE"};"#),
            Err(ScriptError::InvalidCmd(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::from_str(
                "1.0: {\"type\": \"ENGAGE\"};\n0.5: {\"type\": \"DISENGAGE\"};"
            ),
            Err(ScriptError::OutOfOrder(_, _))
        ));
        assert!(matches!(
            ScriptInterpreter::new("/does/not/exist.txt"),
            Err(ScriptError::ScriptNotFound(_))
        ));
    }
}
