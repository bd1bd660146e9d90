//! Tool registry: the closed set of inspection tools and their schemas
//!
//! Each tool declares a name, a description for the model and a JSON schema
//! of its parameters. The schema list is checked against the adapters'
//! accepted parameters before the first model call.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::{Value, json};

use crate::error::{EngineError, Result};
use crate::exec::{ExecError, resolve_program};
use crate::llm::ToolDefinition;

use super::helm::HelmArgs;
use super::kubectl::KubectlArgs;

/// Registered tools
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolId {
    Kubectl,
    Helm,
}

impl ToolId {
    pub const ALL: [ToolId; 2] = [ToolId::Kubectl, ToolId::Helm];

    /// Name the model uses to request this tool
    pub fn name(&self) -> &'static str {
        match self {
            ToolId::Kubectl => "run_kubectl",
            ToolId::Helm => "run_helm",
        }
    }

    /// Parse from the model-facing name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }

    /// Binary looked up on `PATH`
    pub fn program(&self) -> &'static str {
        match self {
            ToolId::Kubectl => "kubectl",
            ToolId::Helm => "helm",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolId::Kubectl => {
                "Run a read-only kubectl command against the cluster and return its exit code, \
                 stdout, stderr and decoded JSON output (when stdout is JSON). \
                 Pass the kubectl arguments without the leading 'kubectl'."
            }
            ToolId::Helm => {
                "Run a read-only helm command against the cluster and return its exit code, \
                 stdout, stderr and decoded JSON output (when stdout is JSON). \
                 Pass the helm arguments without the leading 'helm'."
            }
        }
    }

    /// Parameters the adapter accepts
    pub fn accepted_params(&self) -> &'static [&'static str] {
        match self {
            ToolId::Kubectl => KubectlArgs::FIELDS,
            ToolId::Helm => HelmArgs::FIELDS,
        }
    }

    /// JSON schema sent to the model
    pub fn input_schema(&self) -> Value {
        let mut properties = common_properties(self.program());
        if *self == ToolId::Helm {
            properties["repo_config"] = json!({
                "type": "string",
                "description": "Path to the repositories file (--repository-config)"
            });
            properties["registry_config"] = json!({
                "type": "string",
                "description": "Path to the registry config file (--registry-config)"
            });
            properties["workdir"] = json!({
                "type": "string",
                "description": "Working directory for the helm process"
            });
            properties["input_data"] = json!({
                "type": "string",
                "description": "Text written to helm's standard input"
            });
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": ["args"],
            "additionalProperties": false
        })
    }

    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.input_schema())
    }
}

fn common_properties(program: &str) -> Value {
    json!({
        "args": {
            "description": format!("Arguments passed to {program}, as one shell-style string or a list"),
            "anyOf": [
                {"type": "string"},
                {"type": "array", "items": {"type": "string"}}
            ]
        },
        "namespace": {"type": "string", "description": "Kubernetes namespace"},
        "context": {"type": "string", "description": "Kubeconfig context to use"},
        "kubeconfig": {"type": "string", "description": "Path to the kubeconfig file"},
        "timeout": {
            "type": ["number", "null"],
            "description": "Timeout in seconds (default 60, null for no timeout)"
        },
        "capture_output": {"type": "boolean", "description": "Capture stdout and stderr (default true)"},
        "check": {"type": "boolean", "description": "Treat a non-zero exit code as an error (default false)"},
        "env": {
            "type": "array",
            "description": "Extra environment variables",
            "items": {
                "type": "object",
                "properties": {
                    "name": {"type": "string"},
                    "value": {"type": "string"}
                },
                "required": ["name", "value"]
            }
        }
    })
}

/// Definitions for every registered tool
pub fn definitions() -> Vec<ToolDefinition> {
    ToolId::ALL.iter().map(ToolId::definition).collect()
}

/// Check that `defs` names exactly the registered tools and that each schema's
/// properties are exactly the parameters its adapter accepts.
pub fn validate_definitions(defs: &[ToolDefinition]) -> Result<()> {
    let declared: BTreeSet<&str> = defs.iter().map(|d| d.name.as_str()).collect();
    let registered: BTreeSet<&str> = ToolId::ALL.iter().map(ToolId::name).collect();
    if declared.len() != defs.len() {
        return Err(EngineError::ToolRegistry("duplicate tool definition".to_string()));
    }
    if declared != registered {
        return Err(EngineError::ToolRegistry(format!(
            "declared tools {:?} do not match registered tools {:?}",
            declared, registered
        )));
    }

    for def in defs {
        let Some(tool) = ToolId::from_name(&def.name) else {
            continue;
        };
        let properties: BTreeSet<&str> = def.parameters["properties"]
            .as_object()
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default();
        let accepted: BTreeSet<&str> = tool.accepted_params().iter().copied().collect();
        if properties != accepted {
            return Err(EngineError::ToolRegistry(format!(
                "schema for {} declares {:?} but the adapter accepts {:?}",
                def.name, properties, accepted
            )));
        }
    }

    Ok(())
}

/// Availability of one tool's binary
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryStatus {
    pub tool: ToolId,
    pub path: Option<PathBuf>,
}

impl BinaryStatus {
    pub fn available(&self) -> bool {
        self.path.is_some()
    }
}

/// Look up every tool's binary on `PATH`
pub fn probe_binaries() -> Vec<BinaryStatus> {
    ToolId::ALL
        .into_iter()
        .map(|tool| BinaryStatus {
            tool,
            path: resolve_program(tool.program()),
        })
        .collect()
}

/// Tool-call `timeout` parameter: absent, explicit `null`, or seconds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TimeoutArg {
    /// Not given; the router's default applies
    #[default]
    Default,
    /// `null`: wait forever
    Unbounded,
    Seconds(f64),
}

impl TimeoutArg {
    pub fn resolve(&self, default: Duration) -> std::result::Result<Option<Duration>, ExecError> {
        match *self {
            TimeoutArg::Default => Ok(Some(default)),
            TimeoutArg::Unbounded => Ok(None),
            TimeoutArg::Seconds(secs) => Duration::try_from_secs_f64(secs).map(Some).map_err(|_| {
                ExecError::InvalidArguments(format!("timeout must be a non-negative number, got {}", secs))
            }),
        }
    }
}

impl<'de> Deserialize<'de> for TimeoutArg {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(match Option::<f64>::deserialize(deserializer)? {
            Some(secs) => TimeoutArg::Seconds(secs),
            None => TimeoutArg::Unbounded,
        })
    }
}

pub(crate) fn default_true() -> bool {
    true
}
