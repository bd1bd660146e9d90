//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - ask: answer one question and exit
//! - chat: interactive session (the default)
//! - tools: list registered tools and binary availability

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// kube-helper - ask questions about a Kubernetes cluster in plain language
#[derive(Parser, Debug)]
#[command(name = "kube-helper")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Cluster context named in the instructions (overrides config and CONTEXT)
    #[arg(long, global = true)]
    pub context: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Answer a single question and exit
    Ask {
        /// The question, e.g. "which pods are not ready in web?"
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },

    /// Start an interactive session
    Chat,

    /// List registered tools, validate their schemas and probe binaries
    Tools,
}
