use anyhow::{Context, Result};
use directories::ProjectDirs;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::palette::DEFAULT_PALETTE;

static PROJECT_DIRS: Lazy<Option<ProjectDirs>> =
    Lazy::new(|| ProjectDirs::from("", "", "facelearn"));

pub static CONFIG_PATH: Lazy<PathBuf> = Lazy::new(|| match option_env!("FACELEARN_CONFIG_PATH") {
    Some(path) => PathBuf::from(path),
    None => PROJECT_DIRS
        .as_ref()
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml")),
});

pub static DEFAULT_MODEL_PATH: Lazy<PathBuf> = Lazy::new(|| {
    PROJECT_DIRS
        .as_ref()
        .map(|dirs| dirs.data_dir().join("learned_faces.bin"))
        .unwrap_or_else(|| PathBuf::from("model/learned_faces.bin"))
});

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Largest L2 distance still treated as the same face.
    pub tolerance: f32,
    /// Length of the embeddings the extractor produces.
    pub dimension: usize,
    pub model_path: PathBuf,
    /// `#rrggbb` colors handed to identities in order of appearance.
    pub palette: Vec<String>,
    /// Speech program and leading args; the text is appended. Empty disables speech.
    pub speech_command: Vec<String>,
    /// Run after every model save. Empty disables it.
    pub model_updated_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tolerance: 0.48,
            dimension: 128,
            model_path: DEFAULT_MODEL_PATH.clone(),
            palette: DEFAULT_PALETTE.iter().map(|c| c.to_string()).collect(),
            speech_command: Vec::new(),
            model_updated_command: Vec::new(),
        }
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
