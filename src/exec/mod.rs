//! Command Executor - runs inspection binaries without a shell
//!
//! This module provides:
//! - Program resolution against `PATH`
//! - argv assembly (shell-word splitting, ordered scope flags)
//! - Async execution with timeout, kill-and-reap, concurrent stdin/stdout/stderr
//! - Structured results with best-effort JSON decoding

mod command;
mod resolve;
mod result;

pub use command::{CommandArgs, DEFAULT_TIMEOUT, EnvVar, ExecRequest, execute};
pub use resolve::resolve_program;
pub use result::{ExecError, ExecutionResult};
