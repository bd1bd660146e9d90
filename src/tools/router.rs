//! Tool routing and execution
//!
//! Defines the ToolRouter trait and KubeToolRouter, which dispatches model
//! tool calls to the kubectl and helm adapters.

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};

use crate::exec::{self, ExecError, ExecutionResult};
use crate::llm::{ToolCall, ToolDefinition};
use crate::redact::redact_secrets;

use super::definition::{ToolId, definitions};
use super::helm::HelmArgs;
use super::kubectl::KubectlArgs;

/// Result of one tool call: an execution result or a failure the model will
/// see as text
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Completed(ExecutionResult),
    Failed(String),
}

impl ToolOutcome {
    /// Content of the `tool` message answering this call
    pub fn to_message_content(&self) -> String {
        match self {
            ToolOutcome::Completed(result) => result.to_json_string(),
            ToolOutcome::Failed(message) => format!("Error: {}", message),
        }
    }

    pub fn execution_result(&self) -> Option<&ExecutionResult> {
        match self {
            ToolOutcome::Completed(result) => Some(result),
            ToolOutcome::Failed(_) => None,
        }
    }
}

impl From<Result<ExecutionResult, ExecError>> for ToolOutcome {
    fn from(result: Result<ExecutionResult, ExecError>) -> Self {
        match result {
            Ok(result) => ToolOutcome::Completed(result),
            Err(e) => ToolOutcome::Failed(redact_secrets(&e.to_string())),
        }
    }
}

/// Trait for routing and executing tool calls
#[async_trait]
pub trait ToolRouter: Send + Sync {
    /// Schemas sent to the model
    fn definitions(&self) -> Vec<ToolDefinition>;

    /// Whether `name` is a registered tool
    fn has_tool(&self, name: &str) -> bool;

    /// Run one call. Failures are reported in the outcome, never as `Err`.
    async fn execute(&self, call: &ToolCall) -> ToolOutcome;
}

/// Router for the kubectl and helm adapters
#[derive(Debug, Clone)]
pub struct KubeToolRouter {
    default_timeout: Duration,
}

impl Default for KubeToolRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl KubeToolRouter {
    pub fn new() -> Self {
        Self {
            default_timeout: exec::DEFAULT_TIMEOUT,
        }
    }

    /// Timeout used when a call does not pass one
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    async fn run(&self, tool: ToolId, call: &ToolCall) -> Result<ExecutionResult, ExecError> {
        let request = match tool {
            ToolId::Kubectl => parse::<KubectlArgs>(call)?.to_request(self.default_timeout)?,
            ToolId::Helm => parse::<HelmArgs>(call)?.to_request(self.default_timeout)?,
        };
        exec::execute(tool.program(), request).await
    }
}

fn parse<T: serde::de::DeserializeOwned>(call: &ToolCall) -> Result<T, ExecError> {
    call.parse_arguments()
        .map_err(|e| ExecError::InvalidArguments(format!("{} arguments: {}", call.name, e)))
}

#[async_trait]
impl ToolRouter for KubeToolRouter {
    fn definitions(&self) -> Vec<ToolDefinition> {
        definitions()
    }

    fn has_tool(&self, name: &str) -> bool {
        ToolId::from_name(name).is_some()
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        let Some(tool) = ToolId::from_name(&call.name) else {
            return ToolOutcome::Failed(format!("unknown tool {}", call.name));
        };

        debug!("Tool call {} -> {}({})", call.id, call.name, call.arguments);
        let outcome = ToolOutcome::from(self.run(tool, call).await);
        if let ToolOutcome::Failed(message) = &outcome {
            warn!("Tool call {} failed: {}", call.id, message);
        }
        outcome
    }
}
