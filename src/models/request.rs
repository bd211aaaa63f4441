//! Background request records
//!
//! A background request is a command issued by a non-terminal collaborator
//! (explorer, editor) through an existing session's shell. Its output is
//! captured into the request instead of being treated as interactive
//! history.

use super::SessionId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// What a background request is for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum RequestKind {
    ChangeDirectory,
    ListDirectory,
    ReadFile(String),
    WriteFile(String),
    Other,
}

impl RequestKind {
    /// File path the request operates on, if any
    pub fn file_path(&self) -> Option<&str> {
        match self {
            RequestKind::ReadFile(path) | RequestKind::WriteFile(path) => Some(path),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::ChangeDirectory => "ChangeDirectory",
            RequestKind::ListDirectory => "ListDirectory",
            RequestKind::ReadFile(_) => "ReadFile",
            RequestKind::WriteFile(_) => "WriteFile",
            RequestKind::Other => "Other",
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.file_path() {
            Some(path) => write!(f, "{}({})", self.name(), path),
            None => f.write_str(self.name()),
        }
    }
}

/// In-flight background request held by a session
#[derive(Debug, Clone)]
pub struct BackgroundRequest {
    pub kind: RequestKind,

    /// Normalized stdout text received since the current step was sent
    pub output_buffer: String,

    /// Stderr text received since the request was accepted
    pub error_buffer: String,

    /// Commands still to be sent, in order
    pub command_queue: VecDeque<String>,

    /// Results of the steps completed so far
    pub step_results: Vec<String>,

    /// Transcript length when the first command was sent
    pub sent_at_offset: usize,

    pub sent_at: DateTime<Utc>,
}

impl BackgroundRequest {
    pub fn new(kind: RequestKind, remaining: VecDeque<String>, sent_at_offset: usize) -> Self {
        Self {
            kind,
            output_buffer: String::new(),
            error_buffer: String::new(),
            command_queue: remaining,
            step_results: Vec::new(),
            sent_at_offset,
            sent_at: Utc::now(),
        }
    }

    /// Whether stderr output was observed for this request
    pub fn saw_stderr(&self) -> bool {
        !self.error_buffer.trim().is_empty()
    }

    /// Completion text: the non-empty step results joined by newlines
    pub fn result_text(&self) -> String {
        self.step_results
            .iter()
            .filter(|step| !step.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Structured result delivered when a background request finishes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundCompletion {
    /// Session that ran the request
    pub session_id: SessionId,

    /// File path for file requests, otherwise the session id
    pub target: String,

    /// Captured output with the trailing prompt removed
    pub text: String,

    pub success: bool,

    pub error_message: Option<String>,

    pub kind: RequestKind,
}

impl BackgroundCompletion {
    pub fn target_for(session_id: &SessionId, kind: &RequestKind) -> String {
        kind.file_path()
            .map(str::to_string)
            .unwrap_or_else(|| session_id.to_string())
    }
}
