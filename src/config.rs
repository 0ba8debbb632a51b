//! Store connection settings persisted between runs.
//!
//! The record lives in a small JSON file in the user's home directory. Values
//! passed on the command line win over the file and are written back, so later
//! runs only need the flags that change.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of the per-user config, placed in the home directory.
pub const CONFIG_FILE_NAME: &str = ".es_config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine the home directory")]
    NoHomeDir,

    #[error("failed to read config file {path}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to decode config file {path}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write config file {path}")]
    Write { path: PathBuf, source: io::Error },

    #[error("failed to encode config")]
    Encode(#[from] serde_json::Error),
}

/// Effective connection settings for the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default, alias = "store_address")]
    pub es_host: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Values supplied explicitly for this run. `None` and `""` both mean "keep".
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub es_host: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl StoreConfig {
    /// `$HOME/.es_config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dirs = BaseDirs::new().ok_or(ConfigError::NoHomeDir)?;
        Ok(dirs.home_dir().join(CONFIG_FILE_NAME))
    }

    /// Apply overrides in place. Returns true if any field was replaced.
    pub fn merge(&mut self, overrides: &ConfigOverrides) -> bool {
        let mut updated = false;
        for (slot, value) in [
            (&mut self.es_host, &overrides.es_host),
            (&mut self.username, &overrides.username),
            (&mut self.password, &overrides.password),
        ] {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                *slot = v.to_string();
                updated = true;
            }
        }
        updated
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        write_private(path, text.as_bytes()).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Holds a password, so a new file is readable by the owner only.
fn write_private(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);
    options.open(path)?.write_all(bytes)
}

/// Load the config at `path`, apply `overrides`, and persist the result when
/// the file was missing or an override changed it.
pub fn load_or_create(
    path: &Path,
    overrides: &ConfigOverrides,
) -> Result<StoreConfig, ConfigError> {
    let (mut cfg, existed) = match fs::read_to_string(path) {
        Ok(text) => {
            let cfg = serde_json::from_str(&text).map_err(|source| ConfigError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
            (cfg, true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => (StoreConfig::default(), false),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let updated = cfg.merge(overrides);
    if updated || !existed {
        cfg.save(path)?;
        tracing::debug!("saved config to {}", path.display());
    }
    Ok(cfg)
}
