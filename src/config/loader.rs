//! Configuration File Loading
//!
//! Finds, loads, validates and saves TOML configuration files.

use super::Config;
use crate::error::{Error, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File name looked up in the working directory
const LOCAL_CONFIG_FILE: &str = "shellmux.toml";

/// Configuration file loader
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Search paths for configuration files, in priority order
    search_paths: Vec<PathBuf>,
    /// Path of the file the configuration was loaded from
    current_path: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader over the default search paths
    pub fn new() -> Self {
        Self {
            search_paths: Self::default_search_paths(),
            current_path: None,
        }
    }

    /// Create a loader over explicit search paths
    pub fn with_search_paths(search_paths: Vec<PathBuf>) -> Self {
        Self {
            search_paths,
            current_path: None,
        }
    }

    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current_path.as_deref()
    }

    /// Load from the first existing search path, or fall back to defaults
    pub fn load(&mut self) -> Result<Config> {
        let found = self.search_paths.iter().find(|p| p.is_file()).cloned();
        match found {
            Some(path) => self.load_from_path(&path),
            None => {
                debug!("No configuration file found, using defaults");
                let config = Config::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    /// Load and validate a specific file
    pub fn load_from_path(&mut self, path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| Error::ConfigLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| Error::ConfigParseFailed {
            reason: format!("{}: {}", path.display(), e),
        })?;
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        self.current_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, config: &Config, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::ConfigSaveFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }

        let content =
            toml::to_string_pretty(config).map_err(|e| Error::ConfigSerializationFailed {
                reason: e.to_string(),
            })?;

        fs::write(path, content).map_err(|e| Error::ConfigSaveFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Default search paths: working directory, config dir, home directory
    fn default_search_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(cwd) = env::current_dir() {
            paths.push(cwd.join(LOCAL_CONFIG_FILE));
        }

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("shellmux").join("config.toml"));
        }

        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".shellmux.toml"));
        }

        paths
    }
}
