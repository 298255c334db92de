//! TOML Configuration File Support
//!
//! Configuration for the pool and its providers, loaded from
//! `~/.config/genpool/pool.toml` by default.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! When the file declares no providers, providers are discovered from the
//! usual API key variables (`GEMINI_API_KEY_1`, `GROQ_API_KEY`, ...), see
//! [`discover_providers`].
//!
//! # Example Configuration
//!
//! ```toml
//! [pool]
//! strategy = "fastest"
//! stats_path = "performance_tracker.json"
//! attempt_timeout_secs = 30
//!
//! [[providers]]
//! name = "groq-1"
//! kind = "chat_completion"
//! api_key_env = "GROQ_API_KEY_1"
//! model = "llama-3.3-70b-versatile"
//! base_url = "https://api.groq.com/openai/v1"
//! temperature = 0.5
//! max_tokens = 1024
//!
//! [[providers]]
//! name = "gemini-1"
//! kind = "gemini"
//! api_key_env = "GEMINI_API_KEY_1"
//! model = "models/gemini-flash-latest"
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::{
    BackendKind, BackendSettings, ChatCompletionBackend, GeminiBackend, Provider,
    DEFAULT_ATTEMPT_TIMEOUT, GEMINI_DEFAULT_BASE_URL,
};
use crate::strategy::Strategy;

/// Default location of the persisted stats document
pub const DEFAULT_STATS_PATH: &str = "performance_tracker.json";

/// System message sent by discovered Groq providers
pub const GROQ_SYSTEM_PROMPT: &str = "Eres Cleo, un asistente útil para inventarios.";

/// Highest numbered key variable probed per provider family
const MAX_NUMBERED_KEYS: usize = 9;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {}: {source}", .path.display())]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// The shared HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where the effective configuration came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    #[default]
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Pool section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolToml {
    /// Selection strategy
    pub strategy: Option<Strategy>,

    /// Where the stats document is kept
    pub stats_path: Option<PathBuf>,

    /// Per-attempt timeout in seconds
    pub attempt_timeout_secs: Option<u64>,

    /// Optional deadline across all attempts of one call, in seconds
    pub overall_deadline_secs: Option<u64>,
}

/// One `[[providers]]` entry
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderToml {
    /// Unique display name
    pub name: String,

    /// Backend dialect
    pub kind: BackendKind,

    /// Inline credential
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the credential
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Model identifier
    pub model: String,

    /// Endpoint base URL (required for chat completion providers)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Optional system instruction
    #[serde(default)]
    pub system_prompt: Option<String>,
}

/// Root of the TOML configuration file
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfigToml {
    /// Pool settings
    pub pool: PoolToml,

    /// Providers in registration order
    pub providers: Vec<ProviderToml>,
}

// =============================================================================
// Resolved Configuration
// =============================================================================

/// Fully resolved settings for one provider
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderConfig {
    /// Unique display name
    pub name: String,
    /// Backend dialect
    pub kind: BackendKind,
    /// Credential
    pub api_key: String,
    /// Model identifier
    pub model: String,
    /// Endpoint base URL
    pub base_url: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Optional system instruction
    pub system_prompt: Option<String>,
}

impl ProviderConfig {
    /// Create an OpenAI-compatible provider config with default sampling
    pub fn chat_completion(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: BackendKind::ChatCompletion,
            api_key: api_key.into(),
            model: model.into(),
            base_url: base_url.into(),
            temperature: 0.7,
            max_tokens: 2000,
            system_prompt: None,
        }
    }

    /// Create a Gemini provider config with default sampling
    pub fn gemini(
        name: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            kind: BackendKind::Gemini,
            ..Self::chat_completion(name, api_key, model, GEMINI_DEFAULT_BASE_URL)
        }
    }

    /// Set sampling parameters
    #[must_use]
    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    /// Set the system instruction
    #[must_use]
    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    fn settings(&self) -> BackendSettings {
        let mut settings = BackendSettings::new(&self.api_key, &self.model, &self.base_url)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens);
        if let Some(ref system) = self.system_prompt {
            settings = settings.with_system_prompt(system);
        }
        settings
    }

    /// Build the provider adapter, sharing the given HTTP client
    #[must_use]
    pub fn build_provider(&self, http_client: &reqwest::Client, timeout: Duration) -> Provider {
        let provider = match self.kind {
            BackendKind::ChatCompletion => Provider::new(
                &self.name,
                ChatCompletionBackend::new(self.settings(), http_client.clone(), timeout),
            ),
            BackendKind::Gemini => Provider::new(
                &self.name,
                GeminiBackend::new(self.settings(), http_client.clone(), timeout),
            ),
        };
        provider.with_timeout(timeout)
    }
}

/// Effective pool configuration after all sources are applied
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Selection strategy
    pub strategy: Strategy,

    /// Where the stats document is kept
    pub stats_path: PathBuf,

    /// Per-attempt timeout
    pub attempt_timeout: Duration,

    /// Optional deadline across all attempts of one call
    pub overall_deadline: Option<Duration>,

    /// Providers in registration order
    pub providers: Vec<ProviderConfig>,

    /// Path to the loaded config file (if any)
    pub config_file_path: Option<PathBuf>,

    /// Where the configuration was loaded from
    source: ConfigSource,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            stats_path: PathBuf::from(DEFAULT_STATS_PATH),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            overall_deadline: None,
            providers: Vec::new(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl PoolConfig {
    /// Get the configuration source
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Build the shared HTTP client used by every provider
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::HttpClient`] if the TLS backend cannot initialise.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        Ok(reqwest::Client::builder()
            .timeout(self.attempt_timeout)
            .build()?)
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/genpool/pool.toml` or
/// `~/.config/genpool/pool.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("genpool").join("pool.toml"))
}

/// Load configuration from all sources with proper priority
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if a
/// provider entry is invalid. A missing config file is not an error.
pub fn load_config() -> Result<PoolConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path, reading the process environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed,
/// or if a provider entry is invalid.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<PoolConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration using `lookup` in place of the process environment
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env(
    path: Option<PathBuf>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<PoolConfig, ConfigError> {
    let mut config = PoolConfig::default();
    let mut file = PoolConfigToml::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            file = toml::from_str(&toml_content)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_toml_config(&mut config, &file.pool);
    apply_env_config(&mut config, &lookup)?;

    config.providers = if file.providers.is_empty() {
        let discovered = discover_providers(&lookup);
        if !discovered.is_empty() {
            tracing::info!(
                providers = discovered.len(),
                "Discovered providers from environment"
            );
        }
        discovered
    } else {
        file.providers
            .iter()
            .map(|entry| resolve_provider(entry, &lookup))
            .collect::<Result<_, _>>()?
    };

    validate(&config)?;
    Ok(config)
}

/// Apply TOML pool settings to the config struct
fn apply_toml_config(config: &mut PoolConfig, toml: &PoolToml) {
    if let Some(strategy) = toml.strategy {
        config.strategy = strategy;
    }
    if let Some(ref path) = toml.stats_path {
        config.stats_path.clone_from(path);
    }
    if let Some(secs) = toml.attempt_timeout_secs {
        config.attempt_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = toml.overall_deadline_secs {
        config.overall_deadline = Some(Duration::from_secs(secs));
    }
}

/// Apply environment overrides to the config struct
fn apply_env_config(
    config: &mut PoolConfig,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup("GENPOOL_STRATEGY") {
        config.strategy = raw
            .parse::<Strategy>()
            .map_err(|e| ConfigError::ValidationError(format!("GENPOOL_STRATEGY: {e}")))?;
        config.source = ConfigSource::Env;
    }
    if let Some(path) = lookup("GENPOOL_STATS_PATH") {
        config.stats_path = PathBuf::from(path);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("GENPOOL_ATTEMPT_TIMEOUT_SECS").and_then(|s| s.parse().ok()) {
        config.attempt_timeout = Duration::from_secs(secs);
        config.source = ConfigSource::Env;
    }
    if let Some(secs) = lookup("GENPOOL_OVERALL_DEADLINE_SECS").and_then(|s| s.parse().ok()) {
        config.overall_deadline = Some(Duration::from_secs(secs));
        config.source = ConfigSource::Env;
    }
    Ok(())
}

fn resolve_provider(
    entry: &ProviderToml,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<ProviderConfig, ConfigError> {
    let api_key = entry
        .api_key
        .clone()
        .or_else(|| entry.api_key_env.as_deref().and_then(lookup))
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            ConfigError::ValidationError(format!(
                "provider '{}' has no credential (set api_key or api_key_env)",
                entry.name
            ))
        })?;

    let base_url = match (entry.kind, &entry.base_url) {
        (_, Some(url)) => url.clone(),
        (BackendKind::Gemini, None) => GEMINI_DEFAULT_BASE_URL.to_string(),
        (BackendKind::ChatCompletion, None) => {
            return Err(ConfigError::ValidationError(format!(
                "provider '{}' needs a base_url",
                entry.name
            )))
        }
    };

    let mut provider = ProviderConfig {
        name: entry.name.clone(),
        kind: entry.kind,
        api_key,
        model: entry.model.clone(),
        base_url,
        ..ProviderConfig::chat_completion("", "", "", "")
    };
    if let Some(temperature) = entry.temperature {
        provider.temperature = temperature;
    }
    if let Some(max_tokens) = entry.max_tokens {
        provider.max_tokens = max_tokens;
    }
    provider.system_prompt.clone_from(&entry.system_prompt);
    Ok(provider)
}

fn validate(config: &PoolConfig) -> Result<(), ConfigError> {
    if config.attempt_timeout.is_zero() {
        return Err(ConfigError::ValidationError(
            "attempt timeout must be greater than zero".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for provider in &config.providers {
        if provider.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider names must not be empty".to_string(),
            ));
        }
        if !seen.insert(provider.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate provider name '{}'",
                provider.name
            )));
        }
        if !(0.0..=2.0).contains(&provider.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "provider '{}' temperature {} is outside 0.0-2.0",
                provider.name, provider.temperature
            )));
        }
    }
    Ok(())
}

// =============================================================================
// Environment Discovery
// =============================================================================

/// Numbered keys `{prefix}_1..9`, or the bare `{prefix}` when none are set
fn numbered_keys(prefix: &str, lookup: &impl Fn(&str) -> Option<String>) -> Vec<String> {
    let numbered: Vec<String> = (1..=MAX_NUMBERED_KEYS)
        .filter_map(|i| lookup(&format!("{prefix}_{i}")))
        .filter(|key| !key.trim().is_empty())
        .collect();

    if numbered.is_empty() {
        lookup(prefix)
            .filter(|key| !key.trim().is_empty())
            .into_iter()
            .collect()
    } else {
        numbered
    }
}

/// Discover providers from API key variables.
///
/// Registration order is fixed: Gemini keys, then Groq keys, then Grok, then
/// OpenAI. Multiple keys of one family become `gemini-1`, `gemini-2`, ...
pub fn discover_providers(lookup: impl Fn(&str) -> Option<String>) -> Vec<ProviderConfig> {
    let mut providers = Vec::new();

    for (i, key) in numbered_keys("GEMINI_API_KEY", &lookup).into_iter().enumerate() {
        providers.push(ProviderConfig::gemini(
            format!("gemini-{}", i + 1),
            key,
            "models/gemini-flash-latest",
        ));
    }

    for (i, key) in numbered_keys("GROQ_API_KEY", &lookup).into_iter().enumerate() {
        providers.push(
            ProviderConfig::chat_completion(
                format!("groq-{}", i + 1),
                key,
                "llama-3.3-70b-versatile",
                "https://api.groq.com/openai/v1",
            )
            .with_sampling(0.5, 1024)
            .with_system_prompt(GROQ_SYSTEM_PROMPT),
        );
    }

    if let Some(key) = lookup("GROK_API_KEY").filter(|k| !k.trim().is_empty()) {
        providers.push(ProviderConfig::chat_completion(
            "grok-beta",
            key,
            "grok-beta",
            "https://api.x.ai/v1",
        ));
    }

    if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.trim().is_empty()) {
        providers.push(ProviderConfig::chat_completion(
            "openai-mini",
            key,
            "gpt-4o-mini",
            "https://api.openai.com/v1",
        ));
    }

    providers
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Strategy override
    pub strategy: Option<Strategy>,

    /// Stats path override
    pub stats_path: Option<PathBuf>,

    /// Attempt timeout override (seconds)
    pub attempt_timeout_secs: Option<u64>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strategy override
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set stats path override
    #[must_use]
    pub fn with_stats_path(mut self, path: PathBuf) -> Self {
        self.stats_path = Some(path);
        self
    }

    /// Set attempt timeout override
    #[must_use]
    pub fn with_attempt_timeout_secs(mut self, secs: u64) -> Self {
        self.attempt_timeout_secs = Some(secs);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut PoolConfig) {
        if self.strategy.is_some()
            || self.stats_path.is_some()
            || self.attempt_timeout_secs.is_some()
        {
            config.source = ConfigSource::Cli;
        }

        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if let Some(ref path) = self.stats_path {
            config.stats_path.clone_from(path);
        }
        if let Some(secs) = self.attempt_timeout_secs.filter(|s| *s > 0) {
            config.attempt_timeout = Duration::from_secs(secs);
        }
    }
}
