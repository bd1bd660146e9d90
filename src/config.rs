//! Configuration loaded from YAML with environment overrides

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::llm::OpenAiConfig;
use crate::llm::openai::{DEFAULT_API_BASE, DEFAULT_API_KEY_ENV};

/// Environment variables that override the configured values
pub const PRIMARY_MODEL_ENV: &str = "K8S_HELPER_MODEL_NAME";
pub const EVALUATOR_MODEL_ENV: &str = "EARLY_STOP_VALIDATOR_MODEL_NAME";
pub const SUMMARIZER_MODEL_ENV: &str = "SUMMARY_KEEPER_MODEL_NAME";
pub const CONTEXT_ENV: &str = "CONTEXT";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    /// Cluster context named in the instructions
    pub context: String,
    pub engine: EngineConfig,
    pub models: ModelsConfig,
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_steps: u32,
    pub early_stop_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: 10,
            early_stop_attempts: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub primary: ModelConfig,
    pub evaluator: ModelConfig,
    pub summarizer: ModelConfig,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            primary: ModelConfig::with_model("gpt-4o"),
            evaluator: ModelConfig::with_model("gpt-4o-mini"),
            summarizer: ModelConfig::with_model("gpt-4o-mini"),
        }
    }
}

/// One model role's endpoint and credentials
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub model: String,
    pub api_base: String,
    /// Name of the variable holding the key, never the key itself
    pub api_key_env: String,
    pub max_tokens: Option<u32>,
    pub timeout_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::with_model("gpt-4o")
    }
}

impl ModelConfig {
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_tokens: None,
            timeout_ms: 120_000,
        }
    }

    pub fn to_openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            model: self.model.clone(),
            api_base: self.api_base.clone(),
            api_key_env: self.api_key_env.clone(),
            max_tokens: self.max_tokens,
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Used when a tool call does not pass `timeout`
    pub default_timeout_secs: f64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            default_timeout_secs: 60.0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            context: "default".to_string(),
            engine: EngineConfig::default(),
            models: ModelsConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let project_name = env!("CARGO_PKG_NAME");

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply model-name and context overrides; empty values are ignored
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(model) = get(PRIMARY_MODEL_ENV) {
            self.models.primary.model = model;
        }
        if let Some(model) = get(EVALUATOR_MODEL_ENV) {
            self.models.evaluator.model = model;
        }
        if let Some(model) = get(SUMMARIZER_MODEL_ENV) {
            self.models.summarizer.model = model;
        }
        if let Some(context) = get(CONTEXT_ENV) {
            self.context = context;
        }
    }
}
