//! Execution results and typed execution failures

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Outcome of one process execution. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Fully resolved argv
    pub cmd: Vec<String>,
    pub returncode: i32,
    pub stdout: String,
    pub stderr: String,
    /// Decoded stdout when it looked like (and was) a JSON object or array
    pub json: Option<Value>,
}

impl ExecutionResult {
    /// Build a result, applying the leading-bracket JSON heuristic to stdout
    pub fn new(cmd: Vec<String>, returncode: i32, stdout: String, stderr: String) -> Self {
        let json = decode_json(&stdout);
        Self {
            cmd,
            returncode,
            stdout,
            stderr,
            json,
        }
    }

    pub fn success(&self) -> bool {
        self.returncode == 0
    }

    /// Serialized form used as the tool message content
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"unserializable result: {}\"}}", e))
    }
}

/// Best-effort JSON decode: only attempted when the first non-whitespace
/// character is `{` or `[`; a parse failure yields `None`.
pub(crate) fn decode_json(stdout: &str) -> Option<Value> {
    if stdout.is_empty() {
        return None;
    }
    let trimmed = stdout.trim_start();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return None;
    }
    serde_json::from_str(stdout).ok()
}

/// Failures of a single command execution
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{program} not found on PATH")]
    BinaryNotFound { program: String },

    #[error("Command {} timed out after {:.1}s", .cmd.join(" "), .timeout.as_secs_f64())]
    Timeout { cmd: Vec<String>, timeout: Duration },

    #[error("Command {} exited with status {code}: {}", .cmd.join(" "), .stderr.trim())]
    NonZeroExit {
        cmd: Vec<String>,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error while running command: {0}")]
    Io(#[from] std::io::Error),
}
