//! Configuration management for nda-guardian.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::logging::LogFormat;
use crate::privacy::{FilterConfig, FilterMode, DEFAULT_SUMMARY_WORDS};
use crate::routing::DEFAULT_CONFIDENCE_THRESHOLD;
use crate::session::DEFAULT_COST_PER_WORD_USD;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "nda-guardian";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "audit.db";

/// Environment variable prefix.
const ENV_PREFIX: &str = "NDA_GUARDIAN_";

/// Fallback for `cloud.api_key`.
const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `NDA_GUARDIAN_`, sections split on `__`)
/// 2. TOML config file at `~/.config/nda-guardian/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Routing configuration.
    pub routing: RoutingConfig,
    /// Cloud model configuration.
    pub cloud: CloudConfig,
    /// Privacy configuration.
    pub privacy: PrivacyConfig,
    /// Audit storage configuration.
    pub storage: StorageConfig,
    /// Log output configuration.
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
}

/// Which on-device model picks tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalModelKind {
    /// Deterministic keyword matching, no model server needed.
    #[default]
    Keyword,
    /// A local function-calling server reached over HTTP.
    Endpoint,
}

/// Routing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Local confidence below which queries are escalated.
    pub confidence_threshold: f64,
    /// Local model implementation.
    pub local_model: LocalModelKind,
    /// URL of the local model server.
    pub endpoint_url: String,
    /// Tokens the local model may generate.
    pub max_tokens: u32,
    /// Local model request timeout in seconds.
    pub timeout_secs: u64,
}

/// Cloud model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Model name.
    pub model: String,
    /// API root.
    pub base_url: String,
    /// API key. Falls back to `GEMINI_API_KEY`. Never serialized.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Output budget for elaborations.
    pub max_output_tokens: u32,
    /// Estimated cost per word sent, in USD.
    pub cost_per_word_usd: f64,
}

/// Privacy-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Maximum words in an anonymized clause summary.
    pub summary_max_words: usize,
    /// Enable the sensitive-data filter.
    pub filters_enabled: bool,
    /// What to do when sensitive data is found.
    pub mode: FilterMode,
    /// Use the built-in patterns (email, phone, SSN, card numbers, addresses).
    pub builtin_patterns: bool,
    /// Extra regex patterns to filter.
    pub custom_patterns: Vec<String>,
    /// Replacement text for redacted matches.
    pub redaction_placeholder: String,
}

/// Audit storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/nda-guardian/audit.db`
    pub database_path: Option<PathBuf>,
    /// Record loaded documents and queries.
    pub audit_enabled: bool,
    /// Maximum age of audit entries in days.
    /// Set to 0 for unlimited.
    pub max_age_days: u32,
}

/// Log output configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Line layout.
    pub format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            local_model: LocalModelKind::Keyword,
            endpoint_url: "http://127.0.0.1:8080/complete".to_string(),
            max_tokens: crate::routing::DEFAULT_MAX_TOKENS,
            timeout_secs: 30,
        }
    }
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            model: crate::routing::DEFAULT_CLOUD_MODEL.to_string(),
            base_url: crate::routing::DEFAULT_CLOUD_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 30,
            max_output_tokens: crate::routing::DEFAULT_MAX_OUTPUT_TOKENS,
            cost_per_word_usd: DEFAULT_COST_PER_WORD_USD,
        }
    }
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        let filter = FilterConfig::default();
        Self {
            summary_max_words: DEFAULT_SUMMARY_WORDS,
            filters_enabled: filter.enabled,
            mode: filter.mode,
            builtin_patterns: filter.use_builtin_patterns,
            custom_patterns: filter.custom_patterns,
            redaction_placeholder: filter.redaction_placeholder,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Resolved at runtime
            audit_enabled: true,
            max_age_days: 30,
        }
    }
}

impl PrivacyConfig {
    /// The filter configuration these settings describe.
    #[must_use]
    pub fn filter_config(&self) -> FilterConfig {
        FilterConfig {
            enabled: self.filters_enabled,
            mode: self.mode,
            use_builtin_patterns: self.builtin_patterns,
            custom_patterns: self.custom_patterns.clone(),
            redaction_placeholder: self.redaction_placeholder.clone(),
        }
    }
}

impl CloudConfig {
    /// Whether an API key is available.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl RoutingConfig {
    /// Local model request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `NDA_GUARDIAN_`)
    ///
    /// `GEMINI_API_KEY` fills in `cloud.api_key` when no other source set it.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let mut config: Config = figment.extract()?;
        if !config.cloud.has_api_key() {
            config.cloud.api_key = std::env::var(GEMINI_API_KEY_VAR)
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.routing.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(invalid(format!(
                "confidence_threshold ({threshold}) must be between 0 and 1"
            )));
        }

        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(invalid(format!(
                "bind address is not a socket address: {}",
                self.server.bind
            )));
        }

        if self.routing.local_model == LocalModelKind::Endpoint
            && self.routing.endpoint_url.trim().is_empty()
        {
            return Err(invalid(
                "endpoint_url is required when local_model is \"endpoint\"".to_string(),
            ));
        }

        for (name, value) in [
            ("routing.max_tokens", u64::from(self.routing.max_tokens)),
            ("routing.timeout_secs", self.routing.timeout_secs),
            ("cloud.timeout_secs", self.cloud.timeout_secs),
            (
                "cloud.max_output_tokens",
                u64::from(self.cloud.max_output_tokens),
            ),
            (
                "privacy.summary_max_words",
                self.privacy.summary_max_words as u64,
            ),
        ] {
            if value == 0 {
                return Err(invalid(format!("{name} must be greater than 0")));
            }
        }

        let cost = self.cloud.cost_per_word_usd;
        if cost.is_nan() || cost < 0.0 {
            return Err(invalid(format!(
                "cost_per_word_usd ({cost}) cannot be negative"
            )));
        }

        for pattern in &self.privacy.custom_patterns {
            if regex::Regex::new(pattern).is_err() {
                return Err(invalid(format!("invalid regex pattern: {pattern}")));
            }
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the max audit age as a Duration.
    #[must_use]
    pub fn max_age(&self) -> Option<chrono::Duration> {
        if self.storage.max_age_days == 0 {
            None
        } else {
            Some(chrono::Duration::days(i64::from(self.storage.max_age_days)))
        }
    }
}

fn invalid(message: String) -> Error {
    Error::ConfigValidation { message }
}
