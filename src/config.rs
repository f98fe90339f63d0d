use std::path::{Path, PathBuf};

use anyhow::Context;
use log::info;
use serde::{Deserialize, Serialize};

use crate::pipeline::persistence::APP_DIR;
use crate::player::DEFAULT_LOOK_AHEAD;

pub const CONFIG_ENV: &str = "BEATCHANNEL_CONFIG";
const CONFIG_FILE: &str = "config.json";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    // relative paths are resolved against the project dir
    pub sounds_dir: PathBuf,
    pub look_ahead: f64,
    pub base_latency: Option<f64>, // seconds, overrides what the device reports
    pub gain: f32,
    pub channel: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sounds_dir: PathBuf::from("sounds"),
            look_ahead: DEFAULT_LOOK_AHEAD,
            base_latency: None,
            gain: 0.8,
            channel: "default".to_string(),
        }
    }
}

impl Config {
    pub fn from_str(content: &str) -> anyhow::Result<Config> {
        let config: Config = serde_json::from_str(content).context("invalid config")?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Config> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Config::from_str(&content).with_context(|| format!("in {}", path.display()))
    }

    // An explicitly named file has to exist; the per-project one is optional.
    pub fn load(project_dir: &Path, explicit: Option<PathBuf>) -> anyhow::Result<Config> {
        if let Some(path) = explicit {
            info!("loading config from {}", path.display());
            return Config::from_file(&path);
        }
        let path = project_dir.join(APP_DIR).join(CONFIG_FILE);
        if !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Ok(Config::default());
        }
        Config::from_file(&path)
    }

    pub fn sounds_path(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.sounds_dir)
    }
}
