//! Configuration loading and persistence.
//!
//! Handles reading and writing the handwire configuration file. The file
//! carries the tracker endpoint, the frame ceiling, and the full mapping
//! profile. Every calibration constant lives here, none in code.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::constants::{DEFAULT_ADDRESS, DEFAULT_PORT, MAX_FRAME_BYTES};
use crate::mapping::MappingProfile;

/// Configuration for the handwire service.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    /// Tracker address.
    pub address: String,
    /// Tracker port.
    pub port: u16,
    /// Ceiling on bytes buffered without forming a complete frame.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
    /// Coordinate mapping and calibration profile.
    #[serde(default)]
    pub profile: MappingProfile,
}

fn default_max_frame_bytes() -> usize {
    MAX_FRAME_BYTES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            max_frame_bytes: MAX_FRAME_BYTES,
            profile: MappingProfile::default(),
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// Directory selection priority:
    /// 1. `#[cfg(test)]` (unit tests): a temp-dir sandbox
    /// 2. `HANDWIRE_CONFIG_DIR` env var: explicit override
    /// 3. Default: platform config dir (e.g. `~/.config/handwire`)
    pub fn config_dir() -> Result<PathBuf> {
        let dir = {
            #[cfg(test)]
            {
                std::env::temp_dir().join("handwire-test")
            }

            #[cfg(not(test))]
            {
                if let Ok(dir) = std::env::var("HANDWIRE_CONFIG_DIR") {
                    PathBuf::from(dir)
                } else {
                    dirs::config_dir()
                        .context("could not determine config directory")?
                        .join("handwire")
                }
            }
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    ///
    /// A missing or unreadable file falls back to defaults; a present but
    /// malformed file is an error (a typo in a calibration profile should
    /// be loud, not silently replaced).
    pub fn load() -> Result<Self> {
        let mut config = match Self::load_from_file() {
            Ok(Some(config)) => config,
            Ok(None) => Self::default(),
            Err(e) => return Err(e),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file() -> Result<Option<Self>> {
        let config_path = Self::config_dir()?.join("config.json");
        if !config_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("read {}", config_path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("parse {}", config_path.display()))?;
        Ok(Some(config))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(address) = std::env::var("HANDWIRE_ADDRESS") {
            self.address = address;
        }
        if let Ok(port) = std::env::var("HANDWIRE_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.port = port;
            }
        }
        if let Ok(max) = std::env::var("HANDWIRE_MAX_FRAME_BYTES") {
            if let Ok(max) = max.parse::<usize>() {
                self.max_frame_bytes = max;
            }
        }
    }

    /// Persists the current configuration to disk as pretty JSON.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("write {}", config_path.display()))?;
        Ok(())
    }
}
