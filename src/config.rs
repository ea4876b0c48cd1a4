use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::provider::{self, Provider};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode settings: {0}")]
    Json(#[from] serde_json::Error),
}

/// Default location of config, theme and log files.
pub fn default_config_dir() -> Result<PathBuf, PersistenceError> {
    dirs::config_dir()
        .map(|dir| dir.join("synthara"))
        .ok_or(PersistenceError::NoConfigDir)
}

/// Serialize `value` as pretty JSON at `path`, creating parent directories.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io { path: path.to_path_buf(), source };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).map_err(io_err)
}

/// Read JSON from `path`, falling back to `T::default()` when the file is
/// missing or unreadable.
pub fn read_json_or_default<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }
    match fs::read_to_string(path).map(|content| serde_json::from_str(&content)) {
        Ok(Ok(value)) => value,
        Ok(Err(e)) => {
            warn!(path = %path.display(), error = %e, "ignoring malformed settings file");
            T::default()
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read settings file");
            T::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub selected_provider: String,
    pub selected_model: String,
    pub api_keys: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            selected_provider: Provider::Google.as_str().to_string(),
            selected_model: DEFAULT_MODEL.to_string(),
            api_keys: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Config,
}

impl KeySource {
    pub fn label(&self) -> &'static str {
        match self {
            KeySource::Env => "env var",
            KeySource::Config => "configured",
        }
    }
}

/// Persisted provider/model selection and credentials.
///
/// Every setter updates memory first and then writes the file, so a failed
/// write still leaves the attempted value in effect for this run.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
    use_env: bool,
}

impl ConfigStore {
    pub fn load(dir: &Path) -> Self {
        let path = dir.join("config.json");
        let config = read_json_or_default(&path);
        Self { path, config, use_env: true }
    }

    /// Ignore credential environment variables.
    #[cfg(test)]
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    #[cfg(test)]
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn selected_provider(&self) -> Provider {
        Provider::from_str(&self.config.selected_provider).unwrap_or(Provider::Google)
    }

    pub fn selected_model(&self) -> &str {
        &self.config.selected_model
    }

    /// Select `provider`; if the current model is not in its catalog the
    /// model falls back to the provider's first model.
    pub fn set_selected_provider(&mut self, provider: Provider) -> Result<(), PersistenceError> {
        self.config.selected_provider = provider.as_str().to_string();
        if !provider::is_valid_model(provider, &self.config.selected_model) {
            self.config.selected_model = provider::default_model(provider).to_string();
        }
        info!(provider = provider.as_str(), model = %self.config.selected_model, "provider selected");
        self.save()
    }

    pub fn set_selected_model(&mut self, model: &str) -> Result<(), PersistenceError> {
        self.config.selected_model = model.to_string();
        info!(model, "model selected");
        self.save()
    }

    pub fn credential(&self, provider: Provider) -> Option<String> {
        self.credential_with_source(provider).map(|(key, _)| key)
    }

    pub fn key_source(&self, provider: Provider) -> Option<KeySource> {
        self.credential_with_source(provider).map(|(_, source)| source)
    }

    fn credential_with_source(&self, provider: Provider) -> Option<(String, KeySource)> {
        if self.use_env {
            let from_env = provider
                .env_keys()
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|key| !key.is_empty());
            if let Some(key) = from_env {
                return Some((key, KeySource::Env));
            }
        }
        self.config
            .api_keys
            .get(provider.as_str())
            .filter(|key| !key.is_empty())
            .map(|key| (key.clone(), KeySource::Config))
    }

    pub fn set_credential(&mut self, provider: Provider, secret: &str) -> Result<(), PersistenceError> {
        self.config
            .api_keys
            .insert(provider.as_str().to_string(), secret.to_string());
        info!(provider = provider.as_str(), "API key stored");
        self.save()
    }

    pub fn save(&self) -> Result<(), PersistenceError> {
        write_json(&self.path, &self.config)
    }
}
