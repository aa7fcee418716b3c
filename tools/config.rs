use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub version: u32,
    pub music_root: String,
    pub catalog_path: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            music_root: "music".to_string(),
            catalog_path: "catalog.redb".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("CATALOG_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("catalog.yaml"))
            .unwrap_or_else(|| PathBuf::from("catalog.yaml")),
        Err(_) => PathBuf::from("catalog.yaml"),
    }
}

/// Loads the config, writing the defaults first when the file is missing.
/// The flag is true when a new file was created.
pub fn load_or_create_config(path: &Path) -> Result<(IngestConfig, bool), ConfigError> {
    if path.exists() {
        let contents = fs::read_to_string(path)?;
        let mut config: IngestConfig = serde_yaml::from_str(&contents)?;
        if config.version < CONFIG_VERSION {
            config.version = CONFIG_VERSION;
        }
        let defaults = IngestConfig::default();
        if config.music_root.trim().is_empty() {
            config.music_root = defaults.music_root;
        }
        if config.catalog_path.trim().is_empty() {
            config.catalog_path = defaults.catalog_path;
        }
        return Ok((config, false));
    }

    let config = IngestConfig::default();
    save_config(path, &config)?;
    Ok((config, true))
}

pub fn save_config(path: &Path, config: &IngestConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_yaml::to_string(config)?;
    fs::write(path, contents)?;
    Ok(())
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value.trim());
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

/// First non-blank of: explicit argument, environment variable, config
/// value (resolved against the config file's directory).
pub fn pick_path(
    arg: Option<String>,
    env_key: &str,
    config_path: &Path,
    config_value: &str,
) -> PathBuf {
    let explicit = arg
        .filter(|value| !value.trim().is_empty())
        .or_else(|| env::var(env_key).ok().filter(|value| !value.trim().is_empty()));
    match explicit {
        Some(value) => PathBuf::from(value),
        None => resolve_path(config_path, config_value),
    }
}
