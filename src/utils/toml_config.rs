//! TOML-based configuration for the research server
//!
//! This module provides declarative configuration for the text-generation
//! providers, the planner and synthesizer, the three research agents and the
//! polling/event/registry tunables via a TOML file (`research.toml`).
//!
//! Secrets never live in the file: providers and agents name the environment
//! variable that holds their API key (`api_key_env`).
//!
//! # Hot Reloading
//!
//! Configuration changes are automatically detected and applied at runtime.
//! Use `ResearchConfigManager` for thread-safe access to the current
//! configuration. Runs take a snapshot when they are created, so a reload
//! only affects runs started afterwards.

use crate::agents::{AgentKind, gemini, openai, perplexity};
use arc_swap::ArcSwap;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Root configuration structure loaded from research.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// Named text-generation provider configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Generator used for the plan step. Absent means the fallback plan.
    #[serde(default)]
    pub planner: Option<GeneratorConfig>,

    /// Generator used for the synthesis step. Absent means the combined
    /// reports become the consensus.
    #[serde(default)]
    pub synthesizer: Option<GeneratorConfig>,

    #[serde(default)]
    pub agents: AgentsConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    #[serde(default)]
    pub research: ResearchOptions,
}

// ============= Server Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    Anthropic {
        /// Environment variable containing API key
        #[serde(default = "default_anthropic_key_env")]
        api_key_env: String,
        #[serde(default = "default_anthropic_model")]
        default_model: String,
    },
    OpenAI {
        /// Environment variable containing API key
        #[serde(default = "default_openai_key_env")]
        api_key_env: String,
        #[serde(default = "default_openai_base")]
        api_base: String,
        default_model: String,
    },
}

impl ProviderConfig {
    pub fn api_key_env(&self) -> &str {
        match self {
            ProviderConfig::Anthropic { api_key_env, .. }
            | ProviderConfig::OpenAI { api_key_env, .. } => api_key_env,
        }
    }

    pub fn default_model(&self) -> &str {
        match self {
            ProviderConfig::Anthropic { default_model, .. }
            | ProviderConfig::OpenAI { default_model, .. } => default_model,
        }
    }
}

fn default_anthropic_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

fn default_anthropic_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

// ============= Generator Configuration =============

/// Planner or synthesizer: one provider, one model, one prompt template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Reference to a provider name defined in [providers]
    pub provider: String,

    /// Model override; the provider's default model otherwise
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    #[serde(default)]
    pub temperature: Option<f32>,

    /// Prompt template override with `{query}`, `{date}` and (synthesis
    /// only) `{reports}` placeholders
    #[serde(default)]
    pub template: Option<String>,

    #[serde(default)]
    pub system_prompt: Option<String>,
}

// ============= Agent Configuration =============

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentsConfig {
    #[serde(default)]
    pub gemini: AgentSettings,

    #[serde(default)]
    pub openai: AgentSettings,

    #[serde(default)]
    pub perplexity: AgentSettings,
}

impl AgentsConfig {
    pub fn get(&self, kind: AgentKind) -> &AgentSettings {
        match kind {
            AgentKind::Gemini => &self.gemini,
            AgentKind::OpenAI => &self.openai,
            AgentKind::Perplexity => &self.perplexity,
        }
    }

    /// Settings for `kind` with every per-agent default filled in
    pub fn resolve(&self, kind: AgentKind) -> AgentEndpoint {
        let settings = self.get(kind);
        AgentEndpoint {
            kind,
            api_key_env: settings
                .api_key_env
                .clone()
                .unwrap_or_else(|| default_agent_key_env(kind)),
            base_url: settings
                .base_url
                .clone()
                .unwrap_or_else(|| default_agent_base_url(kind).to_string()),
            model: settings
                .model
                .clone()
                .unwrap_or_else(|| default_agent_model(kind).to_string()),
            max_tokens: settings.max_tokens,
            prompt: settings.prompt.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout_secs),
        }
    }
}

/// Per-agent overrides. Missing fields take the agent's defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Research prompt template with a `{query}` placeholder
    #[serde(default)]
    pub prompt: Option<String>,

    /// Timeout of a single submit/poll HTTP request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            api_key_env: None,
            base_url: None,
            model: None,
            max_tokens: None,
            prompt: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Fully resolved agent settings
#[derive(Debug, Clone)]
pub struct AgentEndpoint {
    pub kind: AgentKind,
    pub api_key_env: String,
    pub base_url: String,
    pub model: String,
    pub max_tokens: Option<u32>,
    pub prompt: Option<String>,
    pub request_timeout: Duration,
}

fn default_agent_key_env(kind: AgentKind) -> String {
    format!("{}_API_KEY", kind.as_str().to_ascii_uppercase())
}

fn default_agent_base_url(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Gemini => gemini::DEFAULT_BASE_URL,
        AgentKind::OpenAI => openai::DEFAULT_BASE_URL,
        AgentKind::Perplexity => perplexity::DEFAULT_BASE_URL,
    }
}

fn default_agent_model(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Gemini => "deep-research-pro-preview-12-2025",
        AgentKind::OpenAI => "o3-deep-research",
        AgentKind::Perplexity => "sonar-deep-research",
    }
}

// ============= Polling Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,

    /// Per-agent budget measured from the start of polling
    #[serde(default = "default_max_poll_duration")]
    pub max_duration_secs: u64,

    /// Transient failures tolerated per agent, across submit and poll
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff before retry n; the last value is reused
    #[serde(default = "default_backoff")]
    pub backoff_secs: Vec<u64>,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_max_poll_duration() -> u64 {
    3600
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff() -> Vec<u64> {
    vec![5, 10, 15]
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_duration_secs: default_max_poll_duration(),
            max_retries: default_max_retries(),
            backoff_secs: default_backoff(),
        }
    }
}

// ============= Events / Registry / Checkpoint =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// How long a terminal run stays queryable in memory
    #[serde(default = "default_retention")]
    pub retention_secs: u64,

    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_retention() -> u64 {
    3600
}

fn default_sweep_interval() -> u64 {
    60
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Directory for per-run JSON checkpoints; checkpointing is off when unset
    #[serde(default)]
    pub dir: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOptions {
    /// Whether the immediate entry point runs the plan step first
    #[serde(default = "default_true")]
    pub immediate_plan: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ResearchOptions {
    fn default() -> Self {
        Self {
            immediate_plan: true,
        }
    }
}

// ============= Configuration Loading & Validation =============

/// Configuration warnings that don't prevent operation but may indicate issues
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub kind: ConfigWarningKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarningKind {
    UnusedProvider,
    MissingProviderKey,
    MissingAgentKey,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Provider '{0}' referenced by {1} does not exist")]
    MissingProvider(String, String),

    #[error("Watch error: {0}")]
    WatchError(#[from] notify::Error),
}

impl ResearchConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: ResearchConfig = toml::from_str(&content)?;

        config.validate()?;

        Ok(config)
    }

    /// Validate the configuration for internal consistency.
    ///
    /// Missing API keys are not errors: an agent without a key fails at
    /// dispatch and a generator without one falls back to the
    /// deterministic plan/report.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (role, generator) in self.generators() {
            if !self.providers.contains_key(&generator.provider) {
                return Err(ConfigError::MissingProvider(
                    generator.provider.clone(),
                    role.to_string(),
                ));
            }
        }

        if self.polling.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "polling.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.polling.max_duration_secs == 0 {
            return Err(ConfigError::ValidationError(
                "polling.max_duration_secs must be greater than zero".to_string(),
            ));
        }
        if self.polling.backoff_secs.is_empty() {
            return Err(ConfigError::ValidationError(
                "polling.backoff_secs must contain at least one delay".to_string(),
            ));
        }
        if self.events.channel_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "events.channel_capacity must be greater than zero".to_string(),
            ));
        }

        for kind in AgentKind::ALL {
            let endpoint = self.agents.resolve(kind);
            if url::Url::parse(&endpoint.base_url).is_err() {
                return Err(ConfigError::ValidationError(format!(
                    "agents.{}.base_url is not a valid URL: {}",
                    kind, endpoint.base_url
                )));
            }
        }

        Ok(())
    }

    /// Validate configuration with warnings for unused or unusable items
    ///
    /// Returns Ok with warnings, or Err if validation fails
    pub fn validate_with_warnings(&self) -> Result<Vec<ConfigWarning>, ConfigError> {
        self.validate()?;

        let mut warnings = Vec::new();
        warnings.extend(self.check_unused_providers());
        warnings.extend(self.check_provider_keys());
        warnings.extend(self.check_agent_keys());

        Ok(warnings)
    }

    fn generators(&self) -> impl Iterator<Item = (&'static str, &GeneratorConfig)> {
        [("planner", &self.planner), ("synthesizer", &self.synthesizer)]
            .into_iter()
            .filter_map(|(role, generator)| generator.as_ref().map(|g| (role, g)))
    }

    /// Check for providers that aren't referenced by the planner or synthesizer
    fn check_unused_providers(&self) -> Vec<ConfigWarning> {
        use std::collections::HashSet;

        let referenced: HashSet<_> = self.generators().map(|(_, g)| g.provider.as_str()).collect();

        self.providers
            .keys()
            .filter(|name| !referenced.contains(name.as_str()))
            .map(|name| ConfigWarning {
                kind: ConfigWarningKind::UnusedProvider,
                message: format!(
                    "Provider '{}' is defined but not referenced by the planner or synthesizer",
                    name
                ),
            })
            .collect()
    }

    fn check_provider_keys(&self) -> Vec<ConfigWarning> {
        self.generators()
            .filter_map(|(role, generator)| {
                let provider = self.providers.get(&generator.provider)?;
                let env = provider.api_key_env();
                self.resolve_env(env).is_none().then(|| ConfigWarning {
                    kind: ConfigWarningKind::MissingProviderKey,
                    message: format!(
                        "{} provider '{}' needs {} which is not set; the fallback will be used",
                        role, generator.provider, env
                    ),
                })
            })
            .collect()
    }

    fn check_agent_keys(&self) -> Vec<ConfigWarning> {
        AgentKind::ALL
            .into_iter()
            .filter_map(|kind| {
                let endpoint = self.agents.resolve(kind);
                self.resolve_env(&endpoint.api_key_env)
                    .is_none()
                    .then(|| ConfigWarning {
                        kind: ConfigWarningKind::MissingAgentKey,
                        message: format!(
                            "Agent '{}' has no API key ({} is not set) and will fail at dispatch",
                            kind, endpoint.api_key_env
                        ),
                    })
            })
            .collect()
    }

    /// Get a resolved value from an env var reference. Empty values count as unset.
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.trim().is_empty())
    }

    /// Get provider by name
    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval_secs)
    }

    pub fn max_poll_duration(&self) -> Duration {
        Duration::from_secs(self.polling.max_duration_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.registry.retention_secs)
    }
}

// ============= Hot Reloading Configuration Manager =============

/// Thread-safe configuration manager with hot reloading support
pub struct ResearchConfigManager {
    config: Arc<ArcSwap<ResearchConfig>>,
    config_path: PathBuf,
    watcher: RwLock<Option<RecommendedWatcher>>,
}

impl ResearchConfigManager {
    /// Create a new configuration manager and load the initial config
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        // Convert to absolute path for reliable file watching
        let path = path.as_ref();
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(ConfigError::ReadError)?
                .join(path)
        };

        let config = ResearchConfig::load(&path)?;

        Ok(Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: path,
            watcher: RwLock::new(None),
        })
    }

    /// Create a config manager directly from a config (useful for testing)
    /// This won't have file watching capabilities.
    pub fn from_config(config: ResearchConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            config_path: PathBuf::from("research.toml"),
            watcher: RwLock::new(None),
        }
    }

    /// Get the current configuration (lockless read)
    pub fn config(&self) -> Arc<ResearchConfig> {
        self.config.load_full()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Manually reload the configuration from disk
    pub fn reload(&self) -> Result<(), ConfigError> {
        info!("Reloading configuration from {:?}", self.config_path);

        let new_config = ResearchConfig::load(&self.config_path)?;
        self.config.store(Arc::new(new_config));

        info!("Configuration reloaded successfully");
        Ok(())
    }

    /// Start watching for configuration file changes
    pub fn start_watching(&self) -> Result<(), ConfigError> {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();

        let config_path = self.config_path.clone();
        let config_arc = Arc::clone(&self.config);
        let file_name = self.config_path.file_name().map(|n| n.to_os_string());

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    let touches_config = event
                        .paths
                        .iter()
                        .any(|p| p.file_name().map(|n| n.to_os_string()) == file_name);
                    if touches_config && (event.kind.is_modify() || event.kind.is_create()) {
                        // Send reload signal (debounced in the receiver)
                        let _ = tx.send(());
                    }
                }
                Err(e) => {
                    error!("Config watcher error: {:?}", e);
                }
            }
        })?;

        // Watch the config file's parent directory
        if let Some(parent) = self.config_path.parent() {
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        *self.watcher.write() = Some(watcher);

        tokio::spawn(async move {
            let debounce_duration = Duration::from_millis(500);
            let mut last_reload: Option<std::time::Instant> = None;

            while rx.recv().await.is_some() {
                if last_reload.is_some_and(|t| t.elapsed() < debounce_duration) {
                    continue;
                }

                // Wait a bit for file write to complete
                tokio::time::sleep(Duration::from_millis(100)).await;

                match ResearchConfig::load(&config_path) {
                    Ok(new_config) => {
                        config_arc.store(Arc::new(new_config));
                        info!("Configuration hot-reloaded successfully");
                        last_reload = Some(std::time::Instant::now());
                    }
                    Err(e) => {
                        warn!(
                            "Failed to hot-reload config: {}. Keeping previous config.",
                            e
                        );
                    }
                }
            }
        });

        info!("Configuration hot-reload watcher started");
        Ok(())
    }

    /// Stop watching for configuration changes
    pub fn stop_watching(&self) {
        *self.watcher.write() = None;
        info!("Configuration hot-reload watcher stopped");
    }
}

impl Clone for ResearchConfigManager {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            config_path: self.config_path.clone(),
            watcher: RwLock::new(None), // Watcher is not cloned
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_config() -> String {
        r#"
[server]
host = "0.0.0.0"
port = 8080

[providers.claude]
type = "anthropic"
api_key_env = "TEST_ANTHROPIC_KEY"

[providers.gpt]
type = "openai"
api_key_env = "TEST_OPENAI_KEY"
default_model = "gpt-4o"

[planner]
provider = "claude"
max_tokens = 500

[synthesizer]
provider = "claude"
model = "claude-opus-4-20250514"
max_tokens = 6000

[agents.perplexity]
model = "sonar-reasoning-pro"
api_key_env = "TEST_PPLX_KEY"

[polling]
interval_secs = 10
backoff_secs = [1, 2]
"#
        .to_string()
    }

    #[test]
    fn test_parse_config() {
        let config: ResearchConfig = toml::from_str(&create_test_config()).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.planner.as_ref().unwrap().max_tokens, Some(500));
        assert_eq!(
            config.synthesizer.as_ref().unwrap().model.as_deref(),
            Some("claude-opus-4-20250514")
        );
        assert_eq!(config.polling.interval_secs, 10);
        assert_eq!(config.polling.max_retries, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_defaults() {
        let config: ResearchConfig = toml::from_str("").unwrap();

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.polling.interval_secs, 30);
        assert_eq!(config.polling.max_duration_secs, 3600);
        assert_eq!(config.polling.max_retries, 3);
        assert_eq!(config.polling.backoff_secs, vec![5, 10, 15]);
        assert_eq!(config.events.channel_capacity, 256);
        assert!(config.research.immediate_plan);
        assert!(config.planner.is_none());
        assert!(config.checkpoint.dir.is_none());
    }

    #[test]
    fn test_agent_defaults_resolve_per_kind() {
        let config: ResearchConfig = toml::from_str(&create_test_config()).unwrap();

        let gemini = config.agents.resolve(AgentKind::Gemini);
        assert_eq!(gemini.api_key_env, "GEMINI_API_KEY");
        assert_eq!(gemini.base_url, gemini::DEFAULT_BASE_URL);
        assert_eq!(gemini.model, "deep-research-pro-preview-12-2025");

        let openai = config.agents.resolve(AgentKind::OpenAI);
        assert_eq!(openai.api_key_env, "OPENAI_API_KEY");
        assert_eq!(openai.model, "o3-deep-research");

        let perplexity = config.agents.resolve(AgentKind::Perplexity);
        assert_eq!(perplexity.api_key_env, "TEST_PPLX_KEY");
        assert_eq!(perplexity.model, "sonar-reasoning-pro");
        assert_eq!(perplexity.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_validation_missing_provider() {
        let content = r#"
[planner]
provider = "nonexistent"
"#;
        let config: ResearchConfig = toml::from_str(content).unwrap();
        let result = config.validate();

        assert!(
            matches!(result, Err(ConfigError::MissingProvider(ref p, ref role)) if p == "nonexistent" && role == "planner")
        );
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let content = r#"
[polling]
interval_secs = 0
"#;
        let config: ResearchConfig = toml::from_str(content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validation_rejects_empty_backoff() {
        let content = r#"
[polling]
backoff_secs = []
"#;
        let config: ResearchConfig = toml::from_str(content).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_agent_url() {
        let content = r#"
[agents.gemini]
base_url = "not a url"
"#;
        let config: ResearchConfig = toml::from_str(content).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("agents.gemini")
        ));
    }

    #[test]
    fn test_unused_provider_warning() {
        let config: ResearchConfig = toml::from_str(&create_test_config()).unwrap();
        let warnings = config.validate_with_warnings().unwrap();

        assert!(
            warnings
                .iter()
                .any(|w| w.kind == ConfigWarningKind::UnusedProvider && w.message.contains("gpt"))
        );
        assert!(
            !warnings
                .iter()
                .any(|w| w.kind == ConfigWarningKind::UnusedProvider
                    && w.message.contains("claude"))
        );
    }

    #[test]
    fn test_missing_agent_key_warning() {
        let content = r#"
[agents.gemini]
api_key_env = "META_RESEARCH_TEST_UNSET_GEMINI_KEY"
"#;
        let config: ResearchConfig = toml::from_str(content).unwrap();
        let warnings = config.validate_with_warnings().unwrap();

        assert!(warnings.iter().any(|w| w.kind == ConfigWarningKind::MissingAgentKey
            && w.message.contains("META_RESEARCH_TEST_UNSET_GEMINI_KEY")));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ResearchConfig::load("/definitely/not/here/research.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("research.toml");
        std::fs::write(&path, create_test_config()).unwrap();

        let manager = ResearchConfigManager::new(&path).unwrap();
        assert_eq!(manager.config().server.port, 8080);

        std::fs::write(&path, "[server]\nport = 9090\n").unwrap();
        manager.reload().unwrap();
        assert_eq!(manager.config().server.port, 9090);
    }

    #[test]
    fn test_config_manager_from_config() {
        let config: ResearchConfig = toml::from_str(&create_test_config()).unwrap();

        let manager = ResearchConfigManager::from_config(config.clone());
        let loaded = manager.config();

        assert_eq!(loaded.server.host, config.server.host);
        assert_eq!(loaded.server.port, config.server.port);
    }
}
