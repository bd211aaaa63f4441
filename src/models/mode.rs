//! Inferred input mode of a session

use serde::{Deserialize, Serialize};
use std::fmt;

/// What the shell process is currently waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Process started but has not printed anything recognizable yet
    #[default]
    Initializing,
    /// Main shell prompt, ready for commands
    Normal,
    /// Login flow asking for a user name
    LoginUsername,
    /// Login flow asking for a password
    LoginPassword,
    /// Superuser password prompt
    SudoPassword,
}

impl InputMode {
    /// Modes in which keystrokes go to the hidden password buffer
    pub fn is_password(self) -> bool {
        matches!(self, InputMode::LoginPassword | InputMode::SudoPassword)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            InputMode::Initializing => "Initializing",
            InputMode::Normal => "Normal",
            InputMode::LoginUsername => "LoginUsername",
            InputMode::LoginPassword => "LoginPassword",
            InputMode::SudoPassword => "SudoPassword",
        }
    }
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
