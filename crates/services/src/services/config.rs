//! User configuration loaded from `config.toml`.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

pub const API_URL_ENV: &str = "STORYBOOK_API_URL";
pub const API_KEY_ENV: &str = "STORYBOOK_API_KEY";

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_SYSTEM_PROMPT: &str = "收集{category}，{prompt}";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no model configured: list them with `storybook config models`, then run `storybook config set-model <id>`")]
    MissingModel,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Forwarded to the backend, which falls back to its own key when absent.
    #[serde(skip_serializing, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

fn deserialize_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.map(SecretString::from))
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .filter(|key| !key.trim().is_empty())
    }
}

/// Model and sampling parameters sent with every generation request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    /// `{category}` and `{prompt}` are substituted per request.
    pub system_prompt: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: 4096,
            temperature: 0.7,
            top_p: 0.7,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl GenerationSettings {
    pub fn render_system_prompt(&self, category: &str, prompt: &str) -> String {
        self.system_prompt
            .replace("{category}", category)
            .replace("{prompt}", prompt)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollectionDefaults {
    pub target_count: u32,
    pub batch_size: u32,
}

impl Default for CollectionDefaults {
    fn default() -> Self {
        Self {
            target_count: 1,
            batch_size: 10,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Overrides the platform data directory for the draft database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drafts_db: Option<PathBuf>,
    pub api: ApiConfig,
    pub generation: GenerationSettings,
    pub collection: CollectionDefaults,
}

impl Config {
    /// Load `path`, falling back to defaults when the file does not exist,
    /// then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_file(path)?;
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// The file's contents alone, for editing and saving back without
    /// baking environment overrides into it.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Config::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Point `generation.model` at `model` in the file at `path`, keeping
    /// everything else the file holds.
    pub fn set_model(path: &Path, model: &str) -> Result<Self, ConfigError> {
        let model = model.trim();
        if model.is_empty() {
            return Err(ConfigError::MissingModel);
        }
        let mut config = Self::load_file(path)?;
        config.generation.model = model.to_string();
        config.save(path)?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup(API_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.base_url = url;
        }
        if let Some(key) = lookup(API_KEY_ENV).filter(|v| !v.trim().is_empty()) {
            self.api.api_key = Some(SecretString::from(key));
        }
    }

    /// TOML text of the config, without the API key.
    pub fn render(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the config back out. The API key is never persisted.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = self.render()?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, raw).map_err(write_err)
    }

    pub fn require_model(&self) -> Result<&str, ConfigError> {
        let model = self.generation.model.trim();
        if model.is_empty() {
            Err(ConfigError::MissingModel)
        } else {
            Ok(model)
        }
    }

    pub fn drafts_db_path(&self) -> PathBuf {
        self.drafts_db
            .clone()
            .unwrap_or_else(utils::paths::drafts_db_file)
    }
}
