//! `run_helm` adapter

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::{CommandArgs, EnvVar, ExecError, ExecRequest};

use super::definition::{TimeoutArg, default_true};

/// Arguments the model may pass to `run_helm`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HelmArgs {
    pub args: CommandArgs,
    #[serde(default)]
    pub namespace: Option<String>,
    /// Passed as `--kube-context`
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub kubeconfig: Option<String>,
    #[serde(default)]
    pub repo_config: Option<String>,
    #[serde(default)]
    pub registry_config: Option<String>,
    #[serde(default)]
    pub timeout: TimeoutArg,
    #[serde(default = "default_true")]
    pub capture_output: bool,
    #[serde(default)]
    pub check: bool,
    #[serde(default)]
    pub env: Option<Vec<EnvVar>>,
    #[serde(default)]
    pub workdir: Option<String>,
    /// Written to helm's stdin, e.g. values for `-f -`
    #[serde(default)]
    pub input_data: Option<String>,
}

impl HelmArgs {
    pub const FIELDS: &'static [&'static str] = &[
        "args",
        "namespace",
        "context",
        "kubeconfig",
        "repo_config",
        "registry_config",
        "timeout",
        "capture_output",
        "check",
        "env",
        "workdir",
        "input_data",
    ];

    /// Build the execution request; flags follow in the order `--namespace`,
    /// `--kube-context`, `--kubeconfig`, `--repository-config`, `--registry-config`.
    pub fn to_request(&self, default_timeout: Duration) -> Result<ExecRequest, ExecError> {
        Ok(ExecRequest::new(self.args.clone())
            .flag("--namespace", self.namespace.as_deref())
            .flag("--kube-context", self.context.as_deref())
            .flag("--kubeconfig", self.kubeconfig.as_deref())
            .flag("--repository-config", self.repo_config.as_deref())
            .flag("--registry-config", self.registry_config.as_deref())
            .with_timeout(self.timeout.resolve(default_timeout)?)
            .with_capture_output(self.capture_output)
            .with_check(self.check)
            .with_env(self.env.clone().unwrap_or_default())
            .with_workdir(self.workdir.as_deref().filter(|d| !d.is_empty()).map(PathBuf::from))
            .with_stdin(self.input_data.clone()))
    }
}
