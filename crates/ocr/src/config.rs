use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keywords::{KeywordError, KeywordTables};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Keyword tables: {0}")]
    Keywords(#[from] KeywordError),
}

/// Engine and pipeline settings, read from a TOML file.
///
/// ```toml
/// languages = "chi_sim+eng"
/// tessdata_path = "/usr/share/tessdata"
/// pool_size = 2
/// timeout_secs = 30
/// max_dimension = 2400
/// keywords = "keywords.toml"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language spec, `+`-joined.
    pub languages: String,
    pub tessdata_path: Option<String>,
    /// Maximum number of engine sessions alive at once.
    pub pool_size: usize,
    pub timeout_secs: u64,
    /// Downscale screenshots whose longer side exceeds this many pixels.
    pub max_dimension: Option<u32>,
    /// Keyword tables file. Relative paths resolve against the config file.
    pub keywords: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: "chi_sim+eng".into(),
            tessdata_path: None,
            pool_size: 1,
            timeout_secs: 60,
            max_dimension: None,
            keywords: None,
        }
    }
}

impl OcrConfig {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config = Self::from_toml(&content)?;
        if let (Some(keywords), Some(dir)) = (&config.keywords, path.parent()) {
            if keywords.is_relative() {
                config.keywords = Some(dir.join(keywords));
            }
        }
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// The configured keyword tables, or the built-in ones.
    pub fn load_keyword_tables(&self) -> Result<KeywordTables, ConfigError> {
        match &self.keywords {
            Some(path) => Ok(KeywordTables::load(path)?),
            None => Ok(KeywordTables::default()),
        }
    }
}
