use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::endpoint::stream::DEFAULT_READ_CHUNK_SIZE;

pub const CONFIG_ENV: &str = "WAYPOINT_CONFIG";
pub const DEADLINE_ENV: &str = "WAYPOINT_DEADLINE_MS";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub tls: TlsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Whole-request budget, from resolution to the last response byte.
    pub deadline_ms: u64,
    pub read_chunk_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            deadline_ms: 30_000,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// PEM bundle to trust instead of the built-in roots.
    pub root_certs: Option<PathBuf>,
}

impl Config {
    /// Reads the file named by `WAYPOINT_CONFIG` when set, then applies
    /// environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        cfg.apply_env_overrides()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        if cfg.client.read_chunk_size == 0 {
            anyhow::bail!("client.read_chunk_size must be positive");
        }
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) -> anyhow::Result<()> {
        if let Ok(value) = std::env::var(DEADLINE_ENV) {
            self.client.deadline_ms = value
                .trim()
                .parse()
                .with_context(|| format!("{DEADLINE_ENV} is not a number: {value:?}"))?;
        }
        Ok(())
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.client.deadline_ms)
    }
}
