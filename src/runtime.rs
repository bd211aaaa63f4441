//! Single-threaded session dispatcher
//!
//! One task owns the [`SessionManager`] and applies, one at a time, both
//! requests from UI collaborators and events from session processes. All
//! session mutation is therefore serialized, and the background slot is
//! claimed in the same step that accepts a request. Process I/O runs on
//! per-process tasks and never blocks this loop.

use crate::commands::BackgroundCommand;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{SessionEventBus, SessionEventSubscription};
use crate::manager::SessionManager;
use crate::models::{RequestKind, SessionId};
use crate::process::{ProcessEventReceiver, ProcessSpawner};
use crate::session::SessionSnapshot;
use crate::terminal::input::{EraseResult, Submission};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Queue depth for collaborator requests
const COMMAND_CHANNEL_CAPACITY: usize = 64;

type Reply<T> = oneshot::Sender<T>;

/// Requests handled by the dispatcher task
#[derive(Debug)]
pub enum ManagerCommand {
    CreateSession {
        reply: Reply<SessionId>,
    },
    DestroySession {
        id: SessionId,
        reply: Reply<Result<()>>,
    },
    RestartSession {
        id: SessionId,
        reply: Reply<Result<()>>,
    },
    SetCurrent {
        id: SessionId,
        reply: Reply<Result<()>>,
    },
    Character {
        id: SessionId,
        ch: char,
        reply: Reply<Result<bool>>,
    },
    Erase {
        id: SessionId,
        caret: usize,
        reply: Reply<Result<EraseResult>>,
    },
    SubmitLine {
        id: SessionId,
        reply: Reply<Result<Submission>>,
    },
    SendLine {
        id: SessionId,
        line: String,
        reply: Reply<Result<Submission>>,
    },
    /// Background request; `None` targets the current session
    Execute {
        target: Option<SessionId>,
        command: BackgroundCommand,
        reply: Reply<Result<()>>,
    },
    RequestDirectoryRefresh,
    CurrentSession {
        reply: Reply<Option<SessionId>>,
    },
    Snapshot {
        id: SessionId,
        reply: Reply<Option<SessionSnapshot>>,
    },
    Snapshots {
        reply: Reply<Vec<SessionSnapshot>>,
    },
    Transcript {
        id: SessionId,
        reply: Reply<Option<String>>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}

/// Start the dispatcher with one open session.
///
/// Must be called from within a tokio runtime.
pub fn start(
    config: &Config,
    spawner: Arc<dyn ProcessSpawner>,
) -> Result<(ManagerHandle, JoinHandle<()>)> {
    let (process_tx, process_rx) = mpsc::unbounded_channel();
    let mut manager = SessionManager::new(config, spawner, process_tx)?;
    manager.ensure_session();

    let events = manager.events().clone();
    let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let task = tokio::spawn(run(manager, command_rx, process_rx));

    Ok((
        ManagerHandle {
            commands: command_tx,
            events,
        },
        task,
    ))
}

async fn run(
    mut manager: SessionManager,
    mut commands: mpsc::Receiver<ManagerCommand>,
    mut process_events: ProcessEventReceiver,
) {
    info!("Session dispatcher started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(ManagerCommand::Shutdown { reply }) => {
                    manager.shutdown();
                    let _ = reply.send(());
                    break;
                }
                Some(command) => apply(&mut manager, command),
                None => {
                    debug!("All manager handles dropped");
                    manager.shutdown();
                    break;
                }
            },
            Some(event) = process_events.recv() => manager.handle_process_event(event),
        }
    }
    info!("Session dispatcher stopped");
}

fn apply(manager: &mut SessionManager, command: ManagerCommand) {
    // A dropped reply receiver only means the caller stopped waiting
    match command {
        ManagerCommand::CreateSession { reply } => {
            let _ = reply.send(manager.create_session());
        }
        ManagerCommand::DestroySession { id, reply } => {
            let _ = reply.send(manager.destroy_session(&id));
        }
        ManagerCommand::RestartSession { id, reply } => {
            let _ = reply.send(manager.restart_session(&id));
        }
        ManagerCommand::SetCurrent { id, reply } => {
            let _ = reply.send(manager.set_current_session(&id));
        }
        ManagerCommand::Character { id, ch, reply } => {
            let _ = reply.send(manager.handle_character(&id, ch));
        }
        ManagerCommand::Erase { id, caret, reply } => {
            let _ = reply.send(manager.handle_erase(&id, caret));
        }
        ManagerCommand::SubmitLine { id, reply } => {
            let _ = reply.send(manager.submit_line(&id));
        }
        ManagerCommand::SendLine { id, line, reply } => {
            let _ = reply.send(manager.send_line(&id, &line));
        }
        ManagerCommand::Execute {
            target,
            command,
            reply,
        } => {
            let result = match target {
                Some(id) => manager.execute(&id, command),
                None => manager.execute_on_current(command),
            };
            let _ = reply.send(result);
        }
        ManagerCommand::RequestDirectoryRefresh => manager.request_directory_refresh(),
        ManagerCommand::CurrentSession { reply } => {
            let _ = reply.send(manager.current_session_id().cloned());
        }
        ManagerCommand::Snapshot { id, reply } => {
            let _ = reply.send(manager.snapshot(&id));
        }
        ManagerCommand::Snapshots { reply } => {
            let _ = reply.send(manager.snapshots());
        }
        ManagerCommand::Transcript { id, reply } => {
            let _ = reply.send(manager.session(&id).map(|s| s.transcript().to_string()));
        }
        ManagerCommand::Shutdown { reply } => {
            manager.shutdown();
            let _ = reply.send(());
        }
    }
}

/// Cloneable async handle to the dispatcher
#[derive(Clone)]
pub struct ManagerHandle {
    commands: mpsc::Sender<ManagerCommand>,
    events: SessionEventBus,
}

impl ManagerHandle {
    pub fn subscribe(&self) -> SessionEventSubscription {
        self.events.subscribe()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> ManagerCommand) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| Error::ChannelClosed)?;
        response.await.map_err(|_| Error::ChannelClosed)
    }

    pub async fn create_session(&self) -> Result<SessionId> {
        self.request(|reply| ManagerCommand::CreateSession { reply })
            .await
    }

    pub async fn destroy_session(&self, id: &SessionId) -> Result<()> {
        let id = id.clone();
        self.request(|reply| ManagerCommand::DestroySession { id, reply })
            .await?
    }

    pub async fn restart_session(&self, id: &SessionId) -> Result<()> {
        let id = id.clone();
        self.request(|reply| ManagerCommand::RestartSession { id, reply })
            .await?
    }

    pub async fn set_current_session(&self, id: &SessionId) -> Result<()> {
        let id = id.clone();
        self.request(|reply| ManagerCommand::SetCurrent { id, reply })
            .await?
    }

    pub async fn current_session(&self) -> Result<Option<SessionId>> {
        self.request(|reply| ManagerCommand::CurrentSession { reply })
            .await
    }

    pub async fn handle_character(&self, id: &SessionId, ch: char) -> Result<bool> {
        let id = id.clone();
        self.request(|reply| ManagerCommand::Character { id, ch, reply })
            .await?
    }

    pub async fn handle_erase(&self, id: &SessionId, caret: usize) -> Result<EraseResult> {
        let id = id.clone();
        self.request(|reply| ManagerCommand::Erase { id, caret, reply })
            .await?
    }

    pub async fn submit_line(&self, id: &SessionId) -> Result<Submission> {
        let id = id.clone();
        self.request(|reply| ManagerCommand::SubmitLine { id, reply })
            .await?
    }

    /// Type a whole line and submit it in one dispatcher step
    pub async fn send_line(&self, id: &SessionId, line: &str) -> Result<Submission> {
        let id = id.clone();
        let line = line.to_string();
        self.request(|reply| ManagerCommand::SendLine { id, line, reply })
            .await?
    }

    /// Background request on a specific session
    pub async fn execute(&self, id: &SessionId, command: BackgroundCommand) -> Result<()> {
        let target = Some(id.clone());
        self.request(|reply| ManagerCommand::Execute {
            target,
            command,
            reply,
        })
        .await?
    }

    async fn execute_on_current(&self, command: BackgroundCommand) -> Result<()> {
        self.request(|reply| ManagerCommand::Execute {
            target: None,
            command,
            reply,
        })
        .await?
    }

    pub async fn execute_background_command(&self, command: &str, kind: RequestKind) -> Result<()> {
        self.execute_on_current(BackgroundCommand::new(kind, [command])?)
            .await
    }

    pub async fn read_file(&self, path: &str) -> Result<()> {
        self.execute_on_current(BackgroundCommand::read_file(path)?)
            .await
    }

    pub async fn write_file(&self, path: &str, content: &str) -> Result<()> {
        self.execute_on_current(BackgroundCommand::write_file(path, content)?)
            .await
    }

    pub async fn change_directory(&self, path: &str) -> Result<()> {
        self.execute_on_current(BackgroundCommand::change_directory(path))
            .await
    }

    pub async fn list_directory(&self) -> Result<()> {
        self.execute_on_current(BackgroundCommand::list_directory())
            .await
    }

    pub async fn request_directory_refresh(&self) -> Result<()> {
        self.commands
            .send(ManagerCommand::RequestDirectoryRefresh)
            .await
            .map_err(|_| Error::ChannelClosed)
    }

    pub async fn snapshot(&self, id: &SessionId) -> Result<Option<SessionSnapshot>> {
        let id = id.clone();
        self.request(|reply| ManagerCommand::Snapshot { id, reply })
            .await
    }

    pub async fn snapshots(&self) -> Result<Vec<SessionSnapshot>> {
        self.request(|reply| ManagerCommand::Snapshots { reply })
            .await
    }

    pub async fn transcript(&self, id: &SessionId) -> Result<Option<String>> {
        let id = id.clone();
        self.request(|reply| ManagerCommand::Transcript { id, reply })
            .await
    }

    /// Stop every session and the dispatcher task
    pub async fn shutdown(&self) -> Result<()> {
        self.request(|reply| ManagerCommand::Shutdown { reply })
            .await
    }
}
