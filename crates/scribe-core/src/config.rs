use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScribeError};

/// Top-level Scribe configuration (`scribe.toml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub swarm: SwarmSection,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Run budgets as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmSection {
    /// Wall-clock budget for a whole run, in seconds.
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,
    /// Budget for a single node invocation, in seconds.
    #[serde(default = "default_node_timeout")]
    pub node_timeout_secs: u64,
    #[serde(default = "default_max_handoffs")]
    pub max_handoffs: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

impl Default for SwarmSection {
    fn default() -> Self {
        Self {
            execution_timeout_secs: default_execution_timeout(),
            node_timeout_secs: default_node_timeout(),
            max_handoffs: default_max_handoffs(),
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_execution_timeout() -> u64 { 600 }
fn default_node_timeout() -> u64 { 300 }
fn default_max_handoffs() -> usize { 10 }
fn default_max_iterations() -> usize { 15 }

/// Per-node agent loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum LLM round-trips inside one node invocation.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Run several tool calls from one LLM response concurrently.
    #[serde(default = "default_parallel_tools")]
    pub parallel_tools: bool,
    /// Directory tools resolve relative paths against. Default: current dir.
    #[serde(default)]
    pub working_dir: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            parallel_tools: default_parallel_tools(),
            working_dir: None,
        }
    }
}

fn default_max_turns() -> usize { 8 }
fn default_parallel_tools() -> bool { true }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: None,
        }
    }
}

fn default_provider() -> String { "anthropic".to_string() }
fn default_model_id() -> String { "claude-3-5-sonnet-20241022".to_string() }
fn default_max_tokens() -> u32 { 8192 }
fn default_temperature() -> f32 { 0.0 }

/// Retry configuration for LLM requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 1000 }
fn default_max_backoff() -> u64 { 30000 }

/// Credentials and endpoints for the built-in tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// ImgBB key for `upload_image`. Falls back to `IMGBB_API_KEY`.
    #[serde(default)]
    pub imgbb_api_key: Option<String>,
    /// Dev.to key for `create_devto_article`. Falls back to `DEV_TO_API_KEY`.
    #[serde(default)]
    pub devto_api_key: Option<String>,
    /// Key for the image generation endpoint. Falls back to `OPENAI_API_KEY`.
    #[serde(default)]
    pub image_api_key: Option<String>,
    #[serde(default)]
    pub image_base_url: Option<String>,
    #[serde(default)]
    pub image_model: Option<String>,
}

impl ToolsConfig {
    pub fn imgbb_key(&self) -> Option<String> {
        resolve_secret(self.imgbb_api_key.as_deref(), "IMGBB_API_KEY")
    }

    pub fn devto_key(&self) -> Option<String> {
        resolve_secret(self.devto_api_key.as_deref(), "DEV_TO_API_KEY")
    }

    pub fn image_key(&self) -> Option<String> {
        resolve_secret(self.image_api_key.as_deref(), "OPENAI_API_KEY")
    }
}

/// Budgets handed to the swarm at construction.
///
/// Every field is mandatory; the dispatcher never substitutes a value of
/// its own during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwarmConfig {
    pub execution_timeout: Duration,
    pub node_timeout: Duration,
    pub max_handoffs: usize,
    pub max_iterations: usize,
}

impl SwarmConfig {
    pub fn new(
        execution_timeout: Duration,
        node_timeout: Duration,
        max_handoffs: usize,
        max_iterations: usize,
    ) -> Self {
        Self {
            execution_timeout,
            node_timeout,
            max_handoffs,
            max_iterations,
        }
    }

    /// Reject budgets that could never let a node run.
    pub fn validate(&self) -> Result<()> {
        if self.execution_timeout.is_zero() {
            return Err(ScribeError::Config(
                "execution timeout must be greater than zero".into(),
            ));
        }
        if self.node_timeout.is_zero() {
            return Err(ScribeError::Config(
                "node timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| ScribeError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        toml::from_str(&expanded).map_err(|e| ScribeError::Config(e.to_string()))
    }

    /// Load config from `path`, or fall back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn swarm_config(&self) -> SwarmConfig {
        SwarmConfig::new(
            Duration::from_secs(self.swarm.execution_timeout_secs),
            Duration::from_secs(self.swarm.node_timeout_secs),
            self.swarm.max_handoffs,
            self.swarm.max_iterations,
        )
    }

    /// Model config with the API key resolved from the environment if needed.
    pub fn resolved_model(&self) -> ModelConfig {
        let mut model = self.model.clone();
        let env_var = match model.provider.as_str() {
            "anthropic" | "claude" => "ANTHROPIC_API_KEY",
            _ => "OPENAI_API_KEY",
        };
        model.api_key = resolve_secret(model.api_key.as_deref(), env_var);
        model
    }

    /// Resolve the tool working directory.
    pub fn working_dir(&self) -> PathBuf {
        match &self.agent.working_dir {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }
}

/// Use the configured value unless it is empty or an unexpanded `${VAR}`,
/// otherwise read `env_var`.
fn resolve_secret(configured: Option<&str>, env_var: &str) -> Option<String> {
    match configured {
        Some(v) if !v.trim().is_empty() && !v.starts_with("${") => Some(v.to_string()),
        _ => std::env::var(env_var).ok().filter(|v| !v.trim().is_empty()),
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}
