use crate::error::{DedupError, Result};
use crate::similarity::{Thresholds, DEFAULT_CAPTION_THRESHOLD, DEFAULT_HASH_THRESHOLD};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database_path: PathBuf,
    pub hash_threshold: u32,
    pub caption_threshold: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            hash_threshold: DEFAULT_HASH_THRESHOLD,
            caption_threshold: DEFAULT_CAPTION_THRESHOLD,
        }
    }
}

impl Config {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| DedupError::Config(format!("{}: {}", path.display(), e)))?;
        config.thresholds()?;
        Ok(config)
    }

    pub fn thresholds(&self) -> Result<Thresholds> {
        Thresholds::new(self.hash_threshold, self.caption_threshold)
    }
}

/// `<data dir>/dupcheck/corpus.db`, or `./corpus.db` when no data dir is known.
pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("dupcheck").join("corpus.db"))
        .unwrap_or_else(|| PathBuf::from("corpus.db"))
}
