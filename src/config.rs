use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::http::connection::DEFAULT_SCRATCH_SIZE;
use crate::http::request::{
    DEFAULT_HEADER_ARENA_SIZE, DEFAULT_MAX_BODY_LENGTH, DEFAULT_MAX_HEADERS, RequestLimits,
};

/// Environment variable naming an optional YAML configuration file.
pub const CONFIG_ENV: &str = "SENTINEL_CONFIG";
/// Environment variable overriding `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub limits: LimitsConfig,
    pub static_files: StaticFilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_headers: usize,
    pub header_arena_size: usize,
    pub max_body_length: usize,
    /// Per-connection receive and file-streaming buffer.
    pub scratch_size: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_headers: DEFAULT_MAX_HEADERS,
            header_arena_size: DEFAULT_HEADER_ARENA_SIZE,
            max_body_length: DEFAULT_MAX_BODY_LENGTH,
            scratch_size: DEFAULT_SCRATCH_SIZE,
        }
    }
}

impl LimitsConfig {
    pub fn request_limits(&self) -> RequestLimits {
        RequestLimits {
            max_headers: self.max_headers,
            header_arena_size: self.header_arena_size,
            max_body_length: self.max_body_length,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub root: PathBuf,
    pub list_directories: bool,
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            list_directories: true,
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration, reading variables through `lookup`.
    ///
    /// The YAML file named by `SENTINEL_CONFIG` is read first when set; the
    /// `LISTEN` variable then overrides the listen address.
    pub fn load_with<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(listen_addr) = lookup(LISTEN_ENV) {
            cfg.server.listen_addr = listen_addr;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }
}
