use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::host::GraphicsAttribs;
use crate::loader::RetryPolicy;

/// Top-level runtime configuration. Every field has a default so a config
/// file only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub width: u32,
    pub height: u32,
    /// Directory the preloaded assets are written to.
    pub data_dir: PathBuf,
    pub graphics: GraphicsAttribs,
    pub retry: RetryConfig,
    pub scene: SceneConfig,
    /// `env_logger` filter used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            data_dir: PathBuf::from("ccdata"),
            graphics: GraphicsAttribs::default(),
            retry: RetryConfig::default(),
            scene: SceneConfig::default(),
            log_filter: "info".into(),
        }
    }
}

impl AppConfig {
    pub fn from_toml(source: &str) -> Result<Self> {
        toml::from_str(source).context("invalid configuration")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let source = fs::read_to_string(path)
            .with_context(|| format!("unable to read config {}", path.display()))?;
        Self::from_toml(&source).with_context(|| format!("in {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            backoff_ms: policy.backoff.as_millis() as u64,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        RetryPolicy::new(config.max_attempts, Duration::from_millis(config.backoff_ms))
    }
}

/// What the engine loads once the assets are on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub camera_position: Vec3,
    pub camera_target: Vec3,
    /// ARGB clear colour.
    pub clear_color: [u8; 4],
    pub archive: String,
    pub mesh: String,
    pub texture: String,
    pub lighting: bool,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            camera_position: Vec3::new(0.0, 30.0, -40.0),
            camera_target: Vec3::new(0.0, 5.0, 0.0),
            clear_color: [255, 100, 101, 140],
            archive: "sydney.zip".into(),
            mesh: "sydney.md2".into(),
            texture: "sydney.png".into(),
            lighting: false,
        }
    }
}
