//! CLI module for kube-helper - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for one-shot questions,
//! an interactive chat and tool diagnostics.

pub mod commands;

pub use commands::Cli;
