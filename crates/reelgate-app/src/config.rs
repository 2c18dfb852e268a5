//! Application configuration file.
//!
//! One TOML document with three tables:
//!
//! ```toml
//! [rules.auto_approve]
//! rating_above = 8.0
//!
//! [classifier]
//! enabled = true
//! model = "gpt-4o-mini"
//! api_key_env = "OPENAI_API_KEY"
//!
//! [storage]
//! path = "/var/lib/reelgate/reelgate.db"
//! ```
//!
//! Every key is optional. The API key is never read from the file by
//! default; it comes from the environment variable named by `api_key_env`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use reelgate_core::classifier::ChatClassifierConfig;
use reelgate_core::{ConfigError, RuleConfiguration};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Environment variable consulted for the classifier API key by default.
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Errors loading the application configuration.
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Rules(#[from] ConfigError),
}

/// Semantic classifier settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    /// When false the base rule cascade always decides.
    pub enabled: bool,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    #[serde(flatten)]
    pub chat: ChatClassifierConfig,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            chat: ChatClassifierConfig::default(),
        }
    }
}

impl ClassifierSettings {
    /// Chat classifier config with the API key filled from `lookup`.
    ///
    /// A key found through `api_key_env` wins over one written in the file.
    pub fn chat_config_with<F>(&self, lookup: F) -> ChatClassifierConfig
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut chat = self.chat.clone();
        if let Some(key) = lookup(&self.api_key_env).filter(|k| !k.trim().is_empty()) {
            chat.api_key = Some(key);
        }
        chat
    }

    /// Chat classifier config with the API key read from the environment.
    pub fn chat_config(&self) -> ChatClassifierConfig {
        self.chat_config_with(|name| std::env::var(name).ok())
    }
}

/// Storage settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Database file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub rules: RuleConfiguration,
    pub classifier: ClassifierSettings,
    pub storage: StorageSettings,
}

impl AppConfig {
    /// Parses and validates a configuration document.
    pub fn from_toml_str(s: &str) -> Result<Self, AppConfigError> {
        let config: Self = toml::from_str(s)?;
        config.rules.validate()?;
        Ok(config)
    }

    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppConfigError> {
        let path = match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => path,
            None => {
                warn!("Could not determine config directory, using defaults");
                return Ok(Self::default());
            }
        };

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                info!("Loaded configuration from {:?}", path);
                Self::from_toml_str(&contents)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {:?} not found, using defaults", path);
                Ok(Self::default())
            }
            Err(source) => Err(AppConfigError::Io { path, source }),
        }
    }

    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "reelgate", "reelgate")
            .map(|dirs| dirs.config_dir().join("reelgate.toml"))
    }
}
