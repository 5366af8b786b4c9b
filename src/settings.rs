//! User settings for the remote analysis service.
//!
//! Settings are a flat key/value record persisted as YAML in the user's
//! config directory (`~/.config/ilprobe/settings.yaml` on Linux). A missing
//! file means defaults. The API key falls back to `OPENAI_API_KEY`.

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Environment variable consulted when no key is stored.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Keys accepted by [`Settings::get`] and [`Settings::set`].
pub const KEYS: &[&str] = &["api_key", "model", "max_tokens", "temperature", "base_url"];

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("unknown setting {0:?} (expected one of: {})", KEYS.join(", "))]
    UnknownKey(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
    #[error("no config directory available on this platform")]
    NoConfigDir,
    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings file: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Persisted settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_model() -> String {
    "gpt-5".to_string()
}
fn default_max_tokens() -> u32 {
    4000
}
fn default_temperature() -> f64 {
    0.7
}
fn default_base_url() -> String {
    "https://api.openai.com".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            base_url: default_base_url(),
        }
    }
}

/// Read-only view handed to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptConfiguration {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
    /// `None` when no usable key is configured.
    pub credential: Option<String>,
    pub base_url: String,
}

impl Settings {
    /// True when an API key is present.
    pub fn is_configured(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Fill a blank API key from `value` (typically the environment).
    pub fn with_fallback_key(mut self, value: Option<String>) -> Self {
        if !self.is_configured() {
            if let Some(key) = value.filter(|k| !k.trim().is_empty()) {
                debug!("using API key from {}", API_KEY_ENV);
                self.api_key = key;
            }
        }
        self
    }

    pub fn prompt_configuration(&self) -> PromptConfiguration {
        PromptConfiguration {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            credential: if self.is_configured() {
                Some(self.api_key.clone())
            } else {
                None
            },
            base_url: self.base_url.clone(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "api_key" => Some(self.api_key.clone()),
            "model" => Some(self.model.clone()),
            "max_tokens" => Some(self.max_tokens.to_string()),
            "temperature" => Some(self.temperature.to_string()),
            "base_url" => Some(self.base_url.clone()),
            _ => None,
        }
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let invalid = |reason: &str| SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        };

        match key {
            "api_key" => self.api_key = value.trim().to_string(),
            "model" => {
                let model = value.trim();
                if model.is_empty() {
                    // empty resets to the default model
                    self.model = default_model();
                } else {
                    self.model = model.to_string();
                }
            }
            "max_tokens" => {
                let parsed: u32 = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid("expected a positive integer"))?;
                if parsed == 0 {
                    return Err(invalid("must be greater than zero"));
                }
                self.max_tokens = parsed;
            }
            "temperature" => {
                let parsed: f64 = value
                    .trim()
                    .parse()
                    .map_err(|_| invalid("expected a number"))?;
                if !(0.0..=2.0).contains(&parsed) {
                    return Err(invalid("must be between 0.0 and 2.0"));
                }
                self.temperature = parsed;
            }
            "base_url" => {
                let url = value.trim();
                if !(url.starts_with("https://") || url.starts_with("http://")) {
                    return Err(invalid("must start with http:// or https://"));
                }
                self.base_url = url.trim_end_matches('/').to_string();
            }
            other => return Err(SettingsError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

/// Mask a credential for display, keeping a short prefix and suffix.
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.is_empty() {
        return "(not set)".to_string();
    }
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Location of the settings file.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Store in the platform config directory.
    pub fn default_location() -> Result<Self, SettingsError> {
        let dirs = ProjectDirs::from("", "", "ilprobe").ok_or(SettingsError::NoConfigDir)?;
        Ok(Self::new(dirs.config_dir().join("settings.yaml")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings; defaults when the file does not exist.
    pub fn load(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no settings file, using defaults");
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Settings::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_yaml::to_string(settings)?)?;
        debug!(path = %self.path.display(), "saved settings");
        Ok(())
    }
}
