//! kube-helper - a tool-calling orchestration engine for cluster questions
//!
//! A primary model decides which read-only `kubectl`/`helm` commands to run;
//! the engine executes them without a shell, feeds results back, and lets a
//! smaller model short-circuit the loop when one command's raw output already
//! answers the question.

pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod llm;
pub mod prompt;
pub mod redact;
pub mod tools;

pub use engine::{Engine, PresenterUpdate};
pub use error::{EngineError, Result};
