use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-1106";
pub const DEFAULT_TEMPERATURE: f64 = 0.5;
pub const DEFAULT_DIFF_PROGRAM: &str = "gh";

/// Config location relative to the user's home directory.
const CONFIG_DIR: &str = ".config/openai";
const CONFIG_FILE: &str = "config.toml";

/// Fallback for an empty `[apikey] key`.
const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not resolve the current user's home directory")]
    HomeDir,

    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// What to do when the config file cannot be loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConfigPolicy {
    /// Log the failure and carry on with an empty configuration.
    #[default]
    Lenient,
    /// Abort the run.
    Strict,
}

/// User configuration loaded from `~/.config/openai/config.toml`.
///
/// Every section is optional; a missing section decodes to its empty default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub apikey: ApiKeyConfig,

    #[serde(default)]
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiKeyConfig {
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PromptConfig {
    /// Replacement for the built-in review instruction, only honoured with `--custom-prompt`.
    pub custom: Option<String>,
}

/// Fixed runtime parameters, passed to the loader, fetcher and generator at construction.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Chat completions endpoint.
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    pub temperature: f64,
    /// Explicit config file. `None` means `<home>/.config/openai/config.toml`.
    pub config_path: Option<PathBuf>,
    /// Program invoked to fetch the diff (`gh` unless overridden in tests).
    pub diff_program: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            config_path: None,
            diff_program: DEFAULT_DIFF_PROGRAM.to_string(),
        }
    }
}

impl Settings {
    /// Resolve the config file path, falling back to the home directory layout.
    pub fn config_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.config_path {
            return Ok(path.clone());
        }
        let home = dirs::home_dir().ok_or(ConfigError::HomeDir)?;
        Ok(home.join(CONFIG_DIR).join(CONFIG_FILE))
    }
}

impl Config {
    /// Load the configuration named by `settings`, applying `policy` on failure.
    pub fn load(settings: &Settings, policy: ConfigPolicy) -> Result<Config, ConfigError> {
        let loaded = settings
            .config_path()
            .and_then(|path| Self::load_from(&path));

        match (loaded, policy) {
            (Ok(config), _) => Ok(config),
            (Err(err), ConfigPolicy::Strict) => Err(err),
            (Err(err), ConfigPolicy::Lenient) => {
                warn!(error = %err, "config not loaded, continuing with empty configuration");
                Ok(Config::default())
            }
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        debug!(path = %path.display(), "reading config file");
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the API key: config file value takes precedence,
    /// falls back to the OPENAI_API_KEY env var, then to an empty key.
    pub fn api_key(&self) -> String {
        resolve_api_key(&self.apikey.key, std::env::var(API_KEY_ENV).ok())
    }

    /// The custom prompt, if one is set and not blank.
    pub fn custom_prompt(&self) -> Option<&str> {
        self.prompt
            .custom
            .as_deref()
            .filter(|custom| !custom.trim().is_empty())
    }
}

fn resolve_api_key(configured: &str, from_env: Option<String>) -> String {
    if !configured.is_empty() {
        return configured.to_string();
    }
    from_env.unwrap_or_default()
}
