//! Child process spawner
//!
//! Runs the configured executable with three pipes. Every process gets its
//! own reader task per output stream, a writer task for stdin and a
//! supervisor task that owns the child, so a slow process never blocks the
//! dispatcher or other sessions.

use super::signals::{send_signal, Signal};
use super::{ProcessEvent, ProcessEventSender, ProcessHandle, ProcessSpawner};
use crate::config::ProcessConfig;
use crate::error::{Error, Result};
use crate::models::SessionId;
use crate::terminal::output::Utf8Decoder;
use futures::future::join_all;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Read buffer size for stdout and stderr
const READ_BUFFER_SIZE: usize = 8192;

/// How long the supervisor waits for readers to drain before reporting exit
const READER_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// Grace period used when the handle is dropped without an explicit request
const DEFAULT_GRACE: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy)]
enum StreamKind {
    Stdout,
    Stderr,
}

/// Identifies which session and generation the I/O tasks report for
#[derive(Debug, Clone)]
struct Origin {
    session_id: SessionId,
    generation: u64,
}

/// Spawns the configured executable with piped stdio
#[derive(Debug, Clone)]
pub struct ChildProcessSpawner {
    config: ProcessConfig,
}

impl ChildProcessSpawner {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.config.executable);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.config.working_directory {
            command.current_dir(dir);
        }
        if !self.config.inherit_env {
            command.env_clear();
        }
        command.envs(&self.config.environment);
        command
    }
}

impl ProcessSpawner for ChildProcessSpawner {
    fn spawn(
        &self,
        session_id: &SessionId,
        generation: u64,
        events: ProcessEventSender,
    ) -> Result<ProcessHandle> {
        let executable = self.config.executable.display().to_string();
        let spawn_error = |reason: String| Error::ProcessSpawnFailed {
            executable: executable.clone(),
            reason,
        };

        let mut child = self.command().spawn().map_err(|e| spawn_error(e.to_string()))?;
        let pid = child.id();

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| spawn_error("stdin pipe unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error("stdout pipe unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| spawn_error("stderr pipe unavailable".to_string()))?;

        let origin = Origin {
            session_id: session_id.clone(),
            generation,
        };

        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        tokio::spawn(write_stdin(stdin, stdin_rx, origin.clone(), events.clone()));

        let readers = vec![
            tokio::spawn(read_stream(
                stdout,
                StreamKind::Stdout,
                origin.clone(),
                events.clone(),
            )),
            tokio::spawn(read_stream(
                stderr,
                StreamKind::Stderr,
                origin.clone(),
                events.clone(),
            )),
        ];

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(supervise(child, shutdown_rx, readers, origin, events));

        info!(
            "Spawned '{}' for session {} (pid {:?}, generation {})",
            executable,
            session_id.short(),
            pid,
            generation
        );
        Ok(ProcessHandle::new(pid, stdin_tx, shutdown_tx))
    }
}

async fn write_stdin(
    mut stdin: ChildStdin,
    mut input: mpsc::UnboundedReceiver<Vec<u8>>,
    origin: Origin,
    events: ProcessEventSender,
) {
    while let Some(data) = input.recv().await {
        let result = match stdin.write_all(&data).await {
            Ok(()) => stdin.flush().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(
                "stdin write failed for session {}: {}",
                origin.session_id.short(),
                e
            );
            let _ = events.send(ProcessEvent::WriteFailed {
                session_id: origin.session_id.clone(),
                generation: origin.generation,
                reason: e.to_string(),
            });
            break;
        }
    }
    debug!("stdin writer for session {} stopped", origin.session_id.short());
}

async fn read_stream<R>(mut reader: R, kind: StreamKind, origin: Origin, events: ProcessEventSender)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = Utf8Decoder::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let text = match reader.read(&mut buffer).await {
            Ok(0) => {
                let rest = decoder.finish();
                if !rest.is_empty() {
                    let _ = events.send(output_event(kind, &origin, rest));
                }
                break;
            }
            Ok(n) => decoder.decode(&buffer[..n]),
            Err(e) => {
                warn!(
                    "{:?} read failed for session {}: {}",
                    kind,
                    origin.session_id.short(),
                    e
                );
                break;
            }
        };

        if text.is_empty() {
            continue;
        }
        if events.send(output_event(kind, &origin, text)).is_err() {
            debug!("Dispatcher gone, stopping {:?} reader", kind);
            break;
        }
    }
}

fn output_event(kind: StreamKind, origin: &Origin, text: String) -> ProcessEvent {
    match kind {
        StreamKind::Stdout => ProcessEvent::Stdout {
            session_id: origin.session_id.clone(),
            generation: origin.generation,
            text,
        },
        StreamKind::Stderr => ProcessEvent::Stderr {
            session_id: origin.session_id.clone(),
            generation: origin.generation,
            text,
        },
    }
}

async fn supervise(
    mut child: Child,
    shutdown: oneshot::Receiver<Duration>,
    readers: Vec<JoinHandle<()>>,
    origin: Origin,
    events: ProcessEventSender,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        request = shutdown => {
            let grace = request.unwrap_or(DEFAULT_GRACE);
            terminate(&mut child, grace).await
        }
    };

    // Deliver trailing output before the exit notification
    if tokio::time::timeout(READER_DRAIN_TIMEOUT, join_all(readers))
        .await
        .is_err()
    {
        debug!("Readers for session {} did not drain in time", origin.session_id.short());
    }

    let (exit_code, normal) = match &status {
        Ok(status) => (status.code(), status.code().is_some()),
        Err(e) => {
            warn!("Waiting on session {} process failed: {}", origin.session_id.short(), e);
            (None, false)
        }
    };

    info!(
        "Process for session {} exited (code {:?}, normal {})",
        origin.session_id.short(),
        exit_code,
        normal
    );
    let _ = events.send(ProcessEvent::Exited {
        session_id: origin.session_id,
        generation: origin.generation,
        exit_code,
        normal,
    });
}

/// SIGTERM, bounded wait, then kill
async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<ExitStatus> {
    if let Some(pid) = child.id() {
        if let Err(e) = send_signal(pid, Signal::Terminate) {
            debug!("Graceful termination unavailable: {}", e);
        }
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            warn!("Process {:?} ignored termination, killing", child.id());
            child.kill().await?;
            child.wait().await
        }
    }
}
