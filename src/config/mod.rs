//! Configuration management for shellmux
//!
//! Settings for the session process, the session engine and the prompt
//! table. Every section falls back to defaults, so an empty file is a
//! valid configuration.

pub mod loader;

use crate::error::{Error, Result};
use crate::models::InputMode;
use crate::terminal::prompt::{PromptClassifier, PromptTable, DEFAULT_CLASSIFY_WINDOW};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// How session processes are started
    pub process: ProcessConfig,

    /// Session engine behavior
    pub session: SessionConfig,

    /// Prompt table customization
    pub prompts: PromptConfig,
}

/// Session process configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Executable started for every session
    pub executable: PathBuf,

    /// Extra arguments
    pub args: Vec<String>,

    /// Working directory for the process
    pub working_directory: Option<PathBuf>,

    /// Whether the process inherits this process's environment
    pub inherit_env: bool,

    /// Additional environment variables
    pub environment: HashMap<String, String>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("bin/app"),
            args: Vec::new(),
            working_directory: None,
            inherit_env: true,
            environment: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Trailing characters scanned for prompts
    pub classify_window: usize,

    /// Restart a session's process when it exits
    pub restart_on_exit: bool,

    /// Consecutive restarts allowed without reaching the main prompt
    pub max_restart_attempts: u32,

    /// Wait after SIGTERM before the process is killed
    pub terminate_timeout_ms: u64,

    /// Input that also resets the local transcript
    pub clear_command: String,

    /// Capacity of the session event broadcast channel
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            classify_window: DEFAULT_CLASSIFY_WINDOW,
            restart_on_exit: true,
            max_restart_attempts: 3,
            terminate_timeout_ms: 3000,
            clear_command: "clear".to_string(),
            event_capacity: 256,
        }
    }
}

impl SessionConfig {
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}

/// Custom prompt pattern entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptPatternConfig {
    pub name: String,
    pub pattern: String,
    pub mode: InputMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Start from an empty table instead of the built-in prompts
    pub replace_defaults: bool,

    /// Patterns appended after the built-in ones
    pub patterns: Vec<PromptPatternConfig>,
}

impl PromptConfig {
    /// Build the prompt table described by this section
    pub fn build_table(&self) -> Result<PromptTable> {
        let mut table = if self.replace_defaults {
            PromptTable::new()
        } else {
            PromptTable::with_defaults()
        };
        for entry in &self.patterns {
            table.add_pattern(&entry.name, &entry.pattern, entry.mode)?;
        }
        Ok(table)
    }
}

impl Config {
    /// Classifier for this configuration's prompt table and window
    pub fn classifier(&self) -> Result<PromptClassifier> {
        Ok(PromptClassifier::new(
            self.prompts.build_table()?,
            self.session.classify_window,
        ))
    }

    /// Check the configuration for values the engine cannot run with
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.process.executable.as_os_str().is_empty() {
            return Err(ConfigError::EmptyExecutable);
        }
        if self.session.classify_window == 0 {
            return Err(ConfigError::InvalidClassifyWindow(0));
        }
        if self.session.clear_command.trim().is_empty() {
            return Err(ConfigError::EmptyClearCommand);
        }
        if self.session.event_capacity == 0 {
            return Err(ConfigError::InvalidEventCapacity(0));
        }
        for entry in &self.prompts.patterns {
            if let Err(e) = regex::Regex::new(&entry.pattern) {
                return Err(ConfigError::InvalidPromptPattern(
                    entry.name.clone(),
                    e.to_string(),
                ));
            }
        }
        let has_normal = self.prompts.patterns.iter().any(|p| p.mode == InputMode::Normal);
        if self.prompts.replace_defaults && !has_normal {
            return Err(ConfigError::MissingShellPrompt);
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Executable path cannot be empty")]
    EmptyExecutable,

    #[error("Invalid classify window: {0} (must be greater than 0)")]
    InvalidClassifyWindow(usize),

    #[error("Clear command cannot be empty")]
    EmptyClearCommand,

    #[error("Invalid event capacity: {0} (must be greater than 0)")]
    InvalidEventCapacity(usize),

    #[error("Invalid prompt pattern '{0}': {1}")]
    InvalidPromptPattern(String, String),

    #[error("Prompt table has no main shell prompt")]
    MissingShellPrompt,
}

impl ConfigError {
    /// Config key the error refers to
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::EmptyExecutable => "process.executable",
            ConfigError::InvalidClassifyWindow(_) => "session.classify_window",
            ConfigError::EmptyClearCommand => "session.clear_command",
            ConfigError::InvalidEventCapacity(_) => "session.event_capacity",
            ConfigError::InvalidPromptPattern(..) | ConfigError::MissingShellPrompt => {
                "prompts.patterns"
            }
        }
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::ConfigValidationFailed {
            field: err.field().to_string(),
            reason: err.to_string(),
        }
    }
}
