//! Process lifecycle record
//!
//! Tracks the subprocess that currently backs a session. A new record is
//! started on every spawn; the session keeps only the latest one.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a session process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ProcessStatus {
    /// No process has been started yet, or spawning failed
    #[default]
    Created,
    /// Process is running and owns its pipes
    Running,
    /// Process has exited
    Exited,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessState {
    /// OS process identifier
    pub pid: Option<u32>,

    pub status: ProcessStatus,

    /// When the process was started
    pub start_time: Option<DateTime<Utc>>,

    /// When the process exited
    pub end_time: Option<DateTime<Utc>>,

    /// Exit code, if the platform reported one
    pub exit_code: Option<i32>,

    /// Whether the exit was a normal one
    pub exited_normally: Option<bool>,
}

impl ProcessState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the process as started with the given PID
    pub fn mark_started(&mut self, pid: Option<u32>) {
        *self = Self {
            pid,
            status: ProcessStatus::Running,
            start_time: Some(Utc::now()),
            ..Self::default()
        };
    }

    /// Mark the process as exited
    pub fn mark_exited(&mut self, exit_code: Option<i32>, normal: bool) {
        self.status = ProcessStatus::Exited;
        self.end_time = Some(Utc::now());
        self.exit_code = exit_code;
        self.exited_normally = Some(normal);
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, ProcessStatus::Running)
    }

    /// How long the process ran, once it has exited
    pub fn uptime(&self) -> Option<std::time::Duration> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.signed_duration_since(start).to_std().ok(),
            _ => None,
        }
    }
}
