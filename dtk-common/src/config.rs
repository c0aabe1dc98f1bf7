//! Configuration loading and resolution
//!
//! Resolution priority for every setting:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! A missing or unreadable config file is not fatal: a warning is logged
//! and compiled defaults are used.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "DATATALKER_CONFIG";

/// Application directory name under the platform config dir
const APP_DIR: &str = "datatalker";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub dispatcher: DispatcherConfig,
    pub retrieval: RetrievalConfig,
    pub fetch: FetchConfig,
    pub llm: LlmConfig,
    pub index: IndexConfig,
    pub ogd: OgdConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is unset (e.g. "info", "dtk_fetch=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// HTTP listener configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5780,
        }
    }
}

/// Intent dispatch configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Minimum classifier confidence (0.0-1.0) to accept a route match
    pub confidence_threshold: f64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.6,
        }
    }
}

/// Dataset retrieval configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Number of nearest candidates requested from the similarity index
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 7 }
    }
}

/// Upstream fetch configuration (retry cadence and pagination)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_backoff_secs: u64,
    /// Upper bound for any single backoff delay
    pub max_backoff_secs: u64,
    /// Add up to 10% random jitter to each delay
    pub jitter: bool,
    /// Per-request timeout enforced by the HTTP transport
    pub request_timeout_secs: u64,
    /// Records per page when collecting a paginated result set
    pub page_size: usize,
    /// Concurrent page fetches; defaults to the CPU count when unset
    pub concurrency: Option<usize>,
    /// Upper bound on records pulled for a single dataset
    pub max_records: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_secs: 5,
            max_backoff_secs: 60,
            jitter: true,
            request_timeout_secs: 30,
            page_size: 1000,
            concurrency: None,
            max_records: 32_000,
        }
    }
}

/// OpenAI-compatible chat completion endpoint used for classification and judgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "llama3.1".to_string(),
            api_key: None,
        }
    }
}

/// Similarity search service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub search_url: String,
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            search_url: "http://localhost:8000/search".to_string(),
            collection: "datasets_bge-m3".to_string(),
        }
    }
}

/// Open Government Data platform endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OgdConfig {
    pub api_key: Option<String>,
    pub backend_url: String,
    pub api_url: String,
}

impl Default for OgdConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            backend_url: "https://www.data.gov.in/backend".to_string(),
            api_url: "https://api.data.gov.in".to_string(),
        }
    }
}

impl TomlConfig {
    /// Parse a config file, failing on I/O or syntax errors
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, falling back to compiled defaults on any failure
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            info!("No config file found, using compiled defaults");
            return Self::default();
        };

        match Self::load(path) {
            Ok(config) => {
                info!(path = %path.display(), "Loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config unusable, using compiled defaults");
                Self::default()
            }
        }
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> Result<()> {
        let threshold = self.dispatcher.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "dispatcher.confidence_threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        if self.fetch.max_attempts == 0 {
            return Err(Error::Config("fetch.max_attempts must be at least 1".to_string()));
        }
        if self.fetch.page_size == 0 {
            return Err(Error::Config("fetch.page_size must be at least 1".to_string()));
        }
        if self.fetch.concurrency == Some(0) {
            return Err(Error::Config("fetch.concurrency must be at least 1".to_string()));
        }
        if self.retrieval.top_k == 0 {
            return Err(Error::Config("retrieval.top_k must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Locates the config file following the priority order above
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Resolve the config file path, if any candidate exists.
    ///
    /// An explicit CLI or environment path is returned even if missing, so the
    /// caller can warn about it; the platform default is only returned if present.
    pub fn resolve_path(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        default_config_path().filter(|p| p.exists())
    }

    /// Resolve and load, degrading to defaults
    pub fn load(&self) -> TomlConfig {
        TomlConfig::load_or_default(self.resolve_path().as_deref())
    }
}

/// Platform config path: `<config_dir>/datatalker/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Resolve a secret: CLI → ENV → TOML. Blank values count as absent.
pub fn resolve_secret(cli: Option<&str>, env_var: &str, toml: Option<&str>) -> Option<String> {
    if let Some(value) = cli.filter(|v| is_valid_key(v)) {
        return Some(value.to_string());
    }

    if let Ok(value) = std::env::var(env_var) {
        if is_valid_key(&value) {
            return Some(value);
        }
    }

    toml.filter(|v| is_valid_key(v)).map(str::to_string)
}

/// Validate key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
