use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::api::Mode;

fn default_server_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_mode() -> Mode {
    Mode::Online
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_mode")]
    pub default_mode: Mode,
}

impl Config {
    pub fn new() -> Self {
        Self {
            server_url: default_server_url(),
            default_mode: default_mode(),
        }
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if !config_path.exists() {
            return Ok(Self::new());
        }
        let content = fs::read_to_string(&config_path)?;
        Self::parse(&content)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Persist the selected mode so the next session starts in it.
    pub fn save_default_mode(mode: Mode) -> Result<()> {
        let mut config = Self::load().unwrap_or_else(|_| Self::new());
        config.default_mode = mode;
        config.save()
    }

    fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    fn parse(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(config_dir.join("siterag").join("config.json"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
