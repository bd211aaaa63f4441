//! Session process boundary
//!
//! Each session is backed by one external process reachable only through
//! stdin, stdout, stderr and an exit notification. Spawning goes through
//! the [`ProcessSpawner`] trait so the session layer can be driven by a
//! real child process or by a scripted stand-in.

pub mod child;
pub mod signals;

pub use child::ChildProcessSpawner;

use crate::error::{Error, Result};
use crate::models::SessionId;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Sender half used by process I/O tasks to report back to the dispatcher
pub type ProcessEventSender = mpsc::UnboundedSender<ProcessEvent>;

/// Receiver half drained by the dispatcher
pub type ProcessEventReceiver = mpsc::UnboundedReceiver<ProcessEvent>;

/// Something that happened to a session process.
///
/// Every event carries the generation of the process that produced it so
/// output from a process that has since been replaced can be ignored.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessEvent {
    Stdout {
        session_id: SessionId,
        generation: u64,
        text: String,
    },
    Stderr {
        session_id: SessionId,
        generation: u64,
        text: String,
    },
    /// Writing to stdin failed at the OS level
    WriteFailed {
        session_id: SessionId,
        generation: u64,
        reason: String,
    },
    Exited {
        session_id: SessionId,
        generation: u64,
        exit_code: Option<i32>,
        /// False when the process was killed by a signal
        normal: bool,
    },
}

impl ProcessEvent {
    pub fn session_id(&self) -> &SessionId {
        match self {
            ProcessEvent::Stdout { session_id, .. }
            | ProcessEvent::Stderr { session_id, .. }
            | ProcessEvent::WriteFailed { session_id, .. }
            | ProcessEvent::Exited { session_id, .. } => session_id,
        }
    }

    pub fn generation(&self) -> u64 {
        match self {
            ProcessEvent::Stdout { generation, .. }
            | ProcessEvent::Stderr { generation, .. }
            | ProcessEvent::WriteFailed { generation, .. }
            | ProcessEvent::Exited { generation, .. } => *generation,
        }
    }
}

/// Owned handle to a running session process.
///
/// Dropping the handle without calling [`ProcessHandle::terminate`] also
/// tears the process down.
#[derive(Debug)]
pub struct ProcessHandle {
    pid: Option<u32>,
    stdin: mpsc::UnboundedSender<Vec<u8>>,
    shutdown: Option<oneshot::Sender<Duration>>,
}

impl ProcessHandle {
    pub fn new(
        pid: Option<u32>,
        stdin: mpsc::UnboundedSender<Vec<u8>>,
        shutdown: oneshot::Sender<Duration>,
    ) -> Self {
        Self {
            pid,
            stdin,
            shutdown: Some(shutdown),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Queue bytes for the stdin writer task
    pub fn write(&self, session_id: &SessionId, data: &[u8]) -> Result<()> {
        self.stdin
            .send(data.to_vec())
            .map_err(|_| Error::WriteFailed {
                session_id: session_id.to_string(),
                reason: "stdin is closed".to_string(),
            })
    }

    /// Whether the stdin writer task is still accepting data
    pub fn is_writable(&self) -> bool {
        !self.stdin.is_closed()
    }

    /// Ask the supervisor to stop the process: SIGTERM, wait up to
    /// `grace`, then kill.
    pub fn terminate(mut self, grace: Duration) {
        if let Some(shutdown) = self.shutdown.take() {
            if shutdown.send(grace).is_err() {
                debug!("Process {:?} already exited before termination", self.pid);
            }
        }
    }
}

/// Creates the process behind a session
pub trait ProcessSpawner: Send + Sync {
    /// Start a process whose I/O is reported on `events` tagged with
    /// `session_id` and `generation`.
    fn spawn(
        &self,
        session_id: &SessionId,
        generation: u64,
        events: ProcessEventSender,
    ) -> Result<ProcessHandle>;
}
