// Configuration file handling

use crate::storage::{FileStorage, KeyValueStorage, SqliteStorage, validate_key};
use crate::store::DEFAULT_STORAGE_KEY;
use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_DIR: &str = "todostore";
const CONFIG_FILE: &str = "todostore.yml";
const SQLITE_FILE: &str = "todostore.db";

/// Longest task text the front end accepts
pub const DEFAULT_MAX_TEXT_LEN: usize = 100;

/// Which storage backend to persist through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    Sqlite,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    /// Directory holding stored data; defaults to the platform data dir
    pub storage_dir: Option<PathBuf>,
    pub storage_key: String,
    pub backend: Backend,
    pub max_text_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_dir: None,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
            backend: Backend::default(),
            max_text_len: DEFAULT_MAX_TEXT_LEN,
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must be readable. Without one, the default location
    /// is used if the file exists, otherwise built-in defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::load_file(&path),
                _ => {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            },
        }
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&content).with_context(|| format!("Invalid config file {}", path.display()))?;
        info!(path = ?path, "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        // An empty file deserializes to unit, not a mapping
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        validate_key(&self.storage_key)?;
        if self.max_text_len == 0 {
            return Err(eyre!("max-text-len must be greater than zero"));
        }
        Ok(())
    }

    /// Storage directory with `~` expanded, falling back to the data dir
    pub fn storage_dir(&self) -> Result<PathBuf> {
        match &self.storage_dir {
            Some(dir) => Ok(expand_home(dir)),
            None => dirs::data_dir()
                .map(|d| d.join(APP_DIR))
                .ok_or_else(|| eyre!("Could not determine a data directory; set storage-dir")),
        }
    }

    /// Open the configured backend
    pub fn open_storage(&self) -> Result<Box<dyn KeyValueStorage>> {
        let dir = self.storage_dir()?;
        debug!(backend = ?self.backend, dir = ?dir, "Opening storage");

        match self.backend {
            Backend::File => Ok(Box::new(FileStorage::open(&dir)?)),
            Backend::Sqlite => {
                fs::create_dir_all(&dir).context("Failed to create storage directory")?;
                Ok(Box::new(SqliteStorage::open(dir.join(SQLITE_FILE))?))
            }
        }
    }
}

/// `<config_dir>/todostore/todostore.yml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE))
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
