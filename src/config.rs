//! Configuration parsing, environment overrides, and validation.
//!
//! Every field has a documented default, so a missing file or a missing
//! section is valid. Environment variables (`DOCLENS_*`) override the file;
//! the result is validated by [`load_config`].

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use doclens_core::validate::ExtensionAllowList;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/doclens.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Remote analysis engine settings.
#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_engine_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: default_engine_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_engine_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

/// Request size limits and the upload allow-list.
#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    /// Total bytes across all files of one analyze request.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_quiz_max_chars")]
    pub quiz_max_chars: usize,
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            max_files: default_max_files(),
            quiz_max_chars: default_quiz_max_chars(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_max_upload_bytes() -> u64 {
    10 * 1024 * 1024
}
fn default_max_files() -> usize {
    10
}
fn default_quiz_max_chars() -> usize {
    20_000
}
fn default_allowed_extensions() -> Vec<String> {
    vec![".pdf".to_string(), ".docx".to_string(), ".txt".to_string()]
}

impl LimitsConfig {
    pub fn allow_list(&self) -> ExtensionAllowList {
        ExtensionAllowList::new(&self.allowed_extensions)
    }
}

/// Load the config file (if present), apply `DOCLENS_*` overrides, validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content).with_context(|| "Failed to parse config file")?
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Apply overrides from `lookup` (the process environment in production).
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(v) = lookup("DOCLENS_DB_PATH") {
        config.db.path = PathBuf::from(v);
    }
    if let Some(v) = lookup("DOCLENS_BIND") {
        config.server.bind = v;
    }
    if let Some(v) = lookup("DOCLENS_ENGINE_URL") {
        config.engine.base_url = v;
    }
    if let Some(v) = lookup("DOCLENS_ENGINE_TIMEOUT_SECS") {
        config.engine.timeout_secs = parse_env("DOCLENS_ENGINE_TIMEOUT_SECS", &v)?;
    }
    if let Some(v) = lookup("DOCLENS_MAX_UPLOAD_BYTES") {
        config.limits.max_upload_bytes = parse_env("DOCLENS_MAX_UPLOAD_BYTES", &v)?;
    }
    if let Some(v) = lookup("DOCLENS_MAX_FILES") {
        config.limits.max_files = parse_env("DOCLENS_MAX_FILES", &v)?;
    }
    if let Some(v) = lookup("DOCLENS_QUIZ_MAX_CHARS") {
        config.limits.quiz_max_chars = parse_env("DOCLENS_QUIZ_MAX_CHARS", &v)?;
    }
    if let Some(v) = lookup("DOCLENS_ALLOWED_EXTENSIONS") {
        config.limits.allowed_extensions = v
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    Ok(())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", key, value))
}

fn validate(config: &Config) -> Result<()> {
    let base_url = &config.engine.base_url;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        bail!(
            "engine.base_url must start with http:// or https://, got '{}'",
            base_url
        );
    }
    if config.engine.timeout_secs == 0 {
        bail!("engine.timeout_secs must be > 0");
    }
    if config.limits.max_upload_bytes == 0 {
        bail!("limits.max_upload_bytes must be > 0");
    }
    if config.limits.max_files == 0 {
        bail!("limits.max_files must be >= 1");
    }
    if config.limits.quiz_max_chars == 0 {
        bail!("limits.quiz_max_chars must be > 0");
    }
    if config.limits.allow_list().is_empty() {
        bail!("limits.allowed_extensions must not be empty");
    }
    Ok(())
}
