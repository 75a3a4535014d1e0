use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::env::{EnvError, parse_env_from};

/// Environment variable overriding [`AppConfig::app_name`].
pub const ENV_APP_NAME: &str = "STRATA_APP_NAME";
/// Environment variable overriding [`AppConfig::storage_dir`].
pub const ENV_STORAGE_DIR: &str = "STRATA_STORAGE_DIR";
/// Environment variable overriding [`AppConfig::lock_timeout_ms`].
pub const ENV_LOCK_TIMEOUT_MS: &str = "STRATA_LOCK_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// Root directory holding one subdirectory per browser profile.
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
    /// Preferred output mode: `pretty`, `text`, or `json`.
    #[serde(default)]
    pub output: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            storage_dir: None,
            lock_timeout_ms: default_lock_timeout_ms(),
            output: None,
        }
    }
}

impl AppConfig {
    /// Store key of the browser-persisted state layer.
    #[must_use]
    pub fn state_key(&self) -> String {
        format!("{}-local-state", self.app_name)
    }

    /// Store key of the browser-persisted entity profile.
    #[must_use]
    pub fn profile_key(&self) -> String {
        format!("{}-entity-profile", self.app_name)
    }

    /// Configured storage directory, or `<data_dir>/strata/browser`.
    #[must_use]
    pub fn resolved_storage_dir(&self) -> PathBuf {
        self.storage_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("strata/browser")
        })
    }

    #[must_use]
    pub const fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Apply `STRATA_*` overrides using `lookup` to read variables.
    ///
    /// # Errors
    ///
    /// Returns an error if an override is set but does not parse.
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), EnvError> {
        if let Some(name) = lookup(ENV_APP_NAME).filter(|v| !v.trim().is_empty()) {
            self.app_name = name.trim().to_string();
        }
        if let Some(dir) = lookup(ENV_STORAGE_DIR).filter(|v| !v.is_empty()) {
            self.storage_dir = Some(PathBuf::from(dir));
        }
        if let Some(raw) = lookup(ENV_LOCK_TIMEOUT_MS) {
            self.lock_timeout_ms = parse_env_from(ENV_LOCK_TIMEOUT_MS, Some(raw), None)?;
        }
        Ok(())
    }
}

/// Load config from `path`, falling back to defaults when it does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config_file(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<AppConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Default location: `<config_dir>/strata/config.toml`.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("strata/config.toml"))
}

/// Load the user config (explicit path or default location) and apply
/// environment overrides from the process environment.
///
/// # Errors
///
/// Returns an error if the config file is malformed or an override is invalid.
pub fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = match explicit.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => load_config_file(&path)?,
        None => AppConfig::default(),
    };
    config
        .apply_env_overrides(|name| std::env::var(name).ok())
        .context("Invalid environment override")?;
    Ok(config)
}

fn default_app_name() -> String {
    "strata".to_string()
}

const fn default_lock_timeout_ms() -> u64 {
    2_000
}
