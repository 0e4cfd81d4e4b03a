use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Env var naming an optional YAML config file.
pub const CONFIG_ENV: &str = "LANTERN_CONFIG";
/// Env var overriding `server.listen_addr`.
pub const LISTEN_ENV: &str = "LISTEN";
/// Env var overriding `static_files.root`.
pub const ROOT_ENV: &str = "ROOT";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// How long a connection may sit idle or stall mid-request.
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    pub root: PathBuf,
    /// Render an HTML listing for directories without an index file.
    /// When off, such directories answer 200 with an empty body.
    pub directory_listing: bool,
    /// File served in place of a directory listing when present.
    pub index_file: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:8080".to_string(),
            read_timeout_secs: 30,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            directory_listing: true,
            index_file: Some("index.html".to_string()),
        }
    }
}

impl ServerConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    ///
    /// Reads the YAML file named by `LANTERN_CONFIG` if set, then applies the
    /// `LISTEN` and `ROOT` overrides.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup(CONFIG_ENV) {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {}", path))?;
                Self::from_yaml(&raw)
                    .with_context(|| format!("invalid config file {}", path))?
            }
            None => Self::default(),
        };

        if let Some(listen_addr) = lookup(LISTEN_ENV) {
            cfg.server.listen_addr = listen_addr;
        }
        if let Some(root) = lookup(ROOT_ENV) {
            cfg.static_files.root = PathBuf::from(root);
        }

        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(raw).context("failed to parse YAML configuration")
    }
}
