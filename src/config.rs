//! Optional settings file for the command-line host.
//!
//! The file is JSON and every field is optional:
//!
//! ```json
//! { "rounds": 60000, "transacted": true, "extra_safe": false, "cipher": "ChaCha20" }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::crypto::TransformParams;
use crate::storage::WriteOptions;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub rounds: u64,
    pub transacted: bool,
    pub extra_safe: bool,
    pub cipher: String,
}

impl Default for Settings {
    fn default() -> Self {
        let write = WriteOptions::default();
        Self {
            rounds: TransformParams::DEFAULT_ROUNDS,
            transacted: write.transacted,
            extra_safe: write.extra_safe,
            cipher: "ChaCha20".to_string(),
        }
    }
}

impl Settings {
    /// Loads settings from `path`, or from the platform config directory
    /// when no path is given. A missing file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            transacted: self.transacted,
            extra_safe: self.extra_safe,
        }
    }
}

/// `<config dir>/kpcore/config.json`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "kpcore").map(|dirs| dirs.config_dir().join("config.json"))
}
