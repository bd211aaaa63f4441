//! Error types and Result aliases for shellmux

use std::fmt;
use std::path::PathBuf;

/// Result type alias for shellmux operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for shellmux
#[derive(Debug)]
pub enum Error {
    // === Process errors ===
    /// The session process could not be started
    ProcessSpawnFailed {
        executable: String,
        reason: String,
    },

    /// The session process exited while work was outstanding
    ProcessCrashed {
        session_id: String,
        exit_code: Option<i32>,
    },

    /// Respawning the session process failed
    ProcessRestartFailed {
        session_id: String,
        reason: String,
    },

    /// Writing to the process stdin failed
    WriteFailed {
        session_id: String,
        reason: String,
    },

    /// The session has no running process to receive input
    StdinUnavailable {
        session_id: String,
    },

    /// Failed to send signal to process
    SignalSendFailed {
        signal: String,
        reason: String,
    },

    // === Session errors ===
    /// No session is selected as current
    NoActiveSession,

    /// Session id is not registered with the manager
    SessionNotFound {
        session_id: String,
    },

    /// Background command attempted outside Normal mode
    SessionNotReady {
        session_id: String,
        mode: String,
    },

    /// Another background request already holds the slot
    RequestSlotBusy {
        holder: String,
    },

    /// Text cannot be passed as a quoted shell argument
    UnquotableArgument {
        text: String,
    },

    // === Prompt errors ===
    /// A prompt pattern failed to compile
    InvalidPromptPattern {
        name: String,
        reason: String,
    },

    // === Configuration errors ===
    /// Failed to load configuration
    ConfigLoadFailed {
        path: PathBuf,
        reason: String,
    },

    /// Failed to save configuration
    ConfigSaveFailed {
        path: PathBuf,
        reason: String,
    },

    /// Configuration validation failed
    ConfigValidationFailed {
        field: String,
        reason: String,
    },

    /// Failed to serialize configuration
    ConfigSerializationFailed {
        reason: String,
    },

    /// Failed to parse configuration
    ConfigParseFailed {
        reason: String,
    },

    // === Runtime errors ===
    /// The dispatcher task is no longer running
    ChannelClosed,

    // === I/O and serialization errors ===
    Io(std::io::Error),
    Serde(serde_json::Error),
    Toml(toml::de::Error),
    Regex(regex::Error),

    /// Generic error with a message
    Other(String),
}

impl Error {
    /// Whether a rejected call may succeed if retried later without
    /// any change on the caller's side.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RequestSlotBusy { .. } | Error::SessionNotReady { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Process errors
            Error::ProcessSpawnFailed { executable, reason } => {
                write!(f, "Failed to spawn '{}': {}", executable, reason)
            }
            Error::ProcessCrashed {
                session_id,
                exit_code,
            } => match exit_code {
                Some(code) => write!(
                    f,
                    "Process for session '{}' terminated (exit code {})",
                    session_id, code
                ),
                None => write!(f, "Process for session '{}' terminated", session_id),
            },
            Error::ProcessRestartFailed { session_id, reason } => {
                write!(
                    f,
                    "Failed to restart process for session '{}': {}",
                    session_id, reason
                )
            }
            Error::WriteFailed { session_id, reason } => {
                write!(f, "Failed to write to session '{}': {}", session_id, reason)
            }
            Error::StdinUnavailable { session_id } => {
                write!(f, "Session '{}' has no running process", session_id)
            }
            Error::SignalSendFailed { signal, reason } => {
                write!(f, "Failed to send signal '{}': {}", signal, reason)
            }

            // Session errors
            Error::NoActiveSession => write!(f, "No active session"),
            Error::SessionNotFound { session_id } => {
                write!(f, "Session '{}' not found", session_id)
            }
            Error::SessionNotReady { session_id, mode } => {
                write!(
                    f,
                    "Session '{}' is not ready for commands (mode: {})",
                    session_id, mode
                )
            }
            Error::RequestSlotBusy { holder } => {
                write!(f, "A background request is already running in session '{}'", holder)
            }
            Error::UnquotableArgument { text } => {
                write!(f, "Cannot quote '{}' for the shell: it contains '\"'", text)
            }

            // Prompt errors
            Error::InvalidPromptPattern { name, reason } => {
                write!(f, "Invalid prompt pattern '{}': {}", name, reason)
            }

            // Configuration errors
            Error::ConfigLoadFailed { path, reason } => {
                write!(f, "Failed to load config from '{}': {}", path.display(), reason)
            }
            Error::ConfigSaveFailed { path, reason } => {
                write!(f, "Failed to save config to '{}': {}", path.display(), reason)
            }
            Error::ConfigValidationFailed { field, reason } => {
                write!(f, "Configuration validation failed for '{}': {}", field, reason)
            }
            Error::ConfigSerializationFailed { reason } => {
                write!(f, "Failed to serialize config: {}", reason)
            }
            Error::ConfigParseFailed { reason } => {
                write!(f, "Failed to parse config: {}", reason)
            }

            Error::ChannelClosed => write!(f, "Session dispatcher is not running"),

            // I/O and serialization errors
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Serde(err) => write!(f, "Serialization error: {}", err),
            Error::Toml(err) => write!(f, "TOML parsing error: {}", err),
            Error::Regex(err) => write!(f, "Regex compilation error: {}", err),

            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Serde(err) => Some(err),
            Error::Toml(err) => Some(err),
            Error::Regex(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Toml(err)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Regex(err)
    }
}

impl From<String> for Error {
    fn from(err: String) -> Self {
        Error::Other(err)
    }
}
