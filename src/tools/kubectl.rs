//! `run_kubectl` adapter

use std::time::Duration;

use serde::Deserialize;

use crate::exec::{CommandArgs, EnvVar, ExecError, ExecRequest};

use super::definition::{TimeoutArg, default_true};

/// Arguments the model may pass to `run_kubectl`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubectlArgs {
    pub args: CommandArgs,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub kubeconfig: Option<String>,
    #[serde(default)]
    pub timeout: TimeoutArg,
    #[serde(default = "default_true")]
    pub capture_output: bool,
    #[serde(default)]
    pub check: bool,
    #[serde(default)]
    pub env: Option<Vec<EnvVar>>,
}

impl KubectlArgs {
    pub const FIELDS: &'static [&'static str] = &[
        "args",
        "namespace",
        "context",
        "kubeconfig",
        "timeout",
        "capture_output",
        "check",
        "env",
    ];

    /// Build the execution request; flags follow in the order
    /// `--namespace`, `--context`, `--kubeconfig`.
    pub fn to_request(&self, default_timeout: Duration) -> Result<ExecRequest, ExecError> {
        Ok(ExecRequest::new(self.args.clone())
            .flag("--namespace", self.namespace.as_deref())
            .flag("--context", self.context.as_deref())
            .flag("--kubeconfig", self.kubeconfig.as_deref())
            .with_timeout(self.timeout.resolve(default_timeout)?)
            .with_capture_output(self.capture_output)
            .with_check(self.check)
            .with_env(self.env.clone().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEFAULT: Duration = Duration::from_secs(60);

    #[test]
    fn test_minimal_args_use_defaults() {
        let args: KubectlArgs = serde_json::from_str(r#"{"args": "get pods"}"#).unwrap();
        let request = args.to_request(DEFAULT).unwrap();

        assert_eq!(request.timeout, Some(DEFAULT));
        assert!(request.capture_output);
        assert!(!request.check);
        assert!(request.env.is_empty());
        assert_eq!(request.build_argv("kubectl").unwrap(), vec!["kubectl", "get", "pods"]);
    }

    #[test]
    fn test_flags_in_fixed_order() {
        let args: KubectlArgs = serde_json::from_str(
            r#"{"args": ["get", "pods"], "kubeconfig": "/kc", "context": "prod", "namespace": "web"}"#,
        )
        .unwrap();
        let argv = args.to_request(DEFAULT).unwrap().build_argv("kubectl").unwrap();

        assert_eq!(
            argv,
            vec!["kubectl", "get", "pods", "--namespace", "web", "--context", "prod", "--kubeconfig", "/kc"]
        );
    }

    #[test]
    fn test_empty_scope_values_are_dropped() {
        let args: KubectlArgs = serde_json::from_str(r#"{"args": "get ns", "namespace": ""}"#).unwrap();
        let argv = args.to_request(DEFAULT).unwrap().build_argv("kubectl").unwrap();
        assert_eq!(argv, vec!["kubectl", "get", "ns"]);
    }

    #[test]
    fn test_null_timeout_is_unbounded() {
        let args: KubectlArgs = serde_json::from_str(r#"{"args": "get pods", "timeout": null}"#).unwrap();
        assert_eq!(args.to_request(DEFAULT).unwrap().timeout, None);
    }

    #[test]
    fn test_explicit_timeout() {
        let args: KubectlArgs = serde_json::from_str(r#"{"args": "get pods", "timeout": 5}"#).unwrap();
        assert_eq!(args.to_request(DEFAULT).unwrap().timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_env_passed_through() {
        let args: KubectlArgs =
            serde_json::from_str(r#"{"args": "get pods", "env": [{"name": "KUBECACHEDIR", "value": "/tmp/c"}]}"#)
                .unwrap();
        let request = args.to_request(DEFAULT).unwrap();
        assert_eq!(request.env[0].name, "KUBECACHEDIR");
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<KubectlArgs, _> = serde_json::from_str(r#"{"args": "get pods", "workdir": "/tmp"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_args_rejected() {
        let result: Result<KubectlArgs, _> = serde_json::from_str(r#"{"namespace": "default"}"#);
        assert!(result.is_err());
    }
}
