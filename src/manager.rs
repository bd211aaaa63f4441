//! Session manager
//!
//! Owns every session (tab), the background request broker and the event
//! bus, and exposes the operations UI collaborators use. The manager is
//! not thread-safe by itself: it is driven by a single dispatcher (see
//! [`crate::runtime`]) that applies one input or process event at a time.

use crate::broker::BackgroundRequestBroker;
use crate::commands::BackgroundCommand;
use crate::config::{Config, SessionConfig};
use crate::error::{Error, Result};
use crate::events::{SessionEvent, SessionEventBus, SessionEventSubscription};
use crate::models::{BackgroundCompletion, RequestKind, SessionId};
use crate::process::{ProcessEvent, ProcessEventSender, ProcessSpawner};
use crate::session::{OutputStream, OutputUpdate, Session, SessionSnapshot};
use crate::terminal::input::{EraseResult, InteractiveDispatcher, Submission};
use crate::terminal::prompt::PromptClassifier;
use std::collections::HashMap;
use std::sync::Arc;

pub struct SessionManager {
    config: SessionConfig,
    classifier: PromptClassifier,
    dispatcher: InteractiveDispatcher,
    broker: BackgroundRequestBroker,
    spawner: Arc<dyn ProcessSpawner>,
    sessions: HashMap<SessionId, Session>,
    /// Tab order
    order: Vec<SessionId>,
    current: Option<SessionId>,
    events: SessionEventBus,
    process_events: ProcessEventSender,
}

impl SessionManager {
    /// Create a manager with no sessions.
    ///
    /// Process output must be fed back through
    /// [`SessionManager::handle_process_event`] from the receiver paired
    /// with `process_events`.
    pub fn new(
        config: &Config,
        spawner: Arc<dyn ProcessSpawner>,
        process_events: ProcessEventSender,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: config.session.clone(),
            classifier: config.classifier()?,
            dispatcher: InteractiveDispatcher::new(config.session.clear_command.clone()),
            broker: BackgroundRequestBroker::new(),
            spawner,
            sessions: HashMap::new(),
            order: Vec::new(),
            current: None,
            events: SessionEventBus::new(config.session.event_capacity),
            process_events,
        })
    }

    pub fn events(&self) -> &SessionEventBus {
        &self.events
    }

    pub fn subscribe(&self) -> SessionEventSubscription {
        self.events.subscribe()
    }

    pub fn classifier(&self) -> &PromptClassifier {
        &self.classifier
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    /// Session ids in tab order
    pub fn session_ids(&self) -> &[SessionId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn current_session_id(&self) -> Option<&SessionId> {
        self.current.as_ref()
    }

    pub fn set_current_session(&mut self, id: &SessionId) -> Result<()> {
        if !self.sessions.contains_key(id) {
            return Err(not_found(id));
        }
        if self.current.as_ref() != Some(id) {
            self.current = Some(id.clone());
            self.events.publish(SessionEvent::CurrentChanged {
                session_id: id.clone(),
            });
        }
        Ok(())
    }

    /// Session holding the background request slot
    pub fn background_slot_holder(&self) -> Option<&SessionId> {
        self.broker.slot_holder()
    }

    pub fn snapshot(&self, id: &SessionId) -> Option<SessionSnapshot> {
        self.sessions.get(id).map(Session::snapshot)
    }

    /// Snapshots of all sessions in tab order
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.order
            .iter()
            .filter_map(|id| self.sessions.get(id))
            .map(Session::snapshot)
            .collect()
    }

    // === Lifecycle ===

    /// Open a tab and spawn its process.
    ///
    /// The tab is registered and becomes current even when spawning fails;
    /// the failure is shown in its transcript and it stays `Initializing`
    /// until restarted.
    pub fn create_session(&mut self) -> SessionId {
        let id = SessionId::new();
        let mut session = Session::new(id.clone());
        self.events.publish(SessionEvent::Created {
            session_id: id.clone(),
        });

        let generation = session.next_generation();
        match self.spawner.spawn(&id, generation, self.process_events.clone()) {
            Ok(handle) => session.attach_process(handle),
            Err(e) => {
                error!("Failed to start session {}: {}", id.short(), e);
                session.append_notice(&e.to_string());
                self.events.publish(SessionEvent::SpawnFailed {
                    session_id: id.clone(),
                    message: e.to_string(),
                });
            }
        }

        self.sessions.insert(id.clone(), session);
        self.order.push(id.clone());
        self.current = Some(id.clone());
        self.events.publish(SessionEvent::CurrentChanged {
            session_id: id.clone(),
        });
        info!("Created session {} ({} open)", id.short(), self.sessions.len());
        id
    }

    /// Make sure at least one session exists; returns the current one
    pub fn ensure_session(&mut self) -> SessionId {
        match &self.current {
            Some(id) => id.clone(),
            None => self.create_session(),
        }
    }

    /// Close a tab: fail its pending request, terminate its process and
    /// drop its state. Closing the last tab opens a fresh one.
    pub fn destroy_session(&mut self, id: &SessionId) -> Result<()> {
        let mut session = self.sessions.remove(id).ok_or_else(|| not_found(id))?;

        if let Some(completion) = self.broker.fail(&mut session, "Session closed") {
            self.events.publish(SessionEvent::RequestCompleted(completion));
        }
        if let Some(process) = session.take_process() {
            process.terminate(self.config.terminate_timeout());
        }

        let position = self.order.iter().position(|s| s == id);
        self.order.retain(|s| s != id);
        self.events.publish(SessionEvent::Closed {
            session_id: id.clone(),
        });
        info!("Closed session {}", id.short());

        if self.order.is_empty() {
            self.current = None;
            self.create_session();
        } else if self.current.as_ref() == Some(id) {
            let index = position.unwrap_or(0).min(self.order.len() - 1);
            let next = self.order[index].clone();
            self.current = Some(next.clone());
            self.events
                .publish(SessionEvent::CurrentChanged { session_id: next });
        }
        Ok(())
    }

    /// Replace a session's process, keeping its history.
    ///
    /// Any pending request is failed first. If the new process cannot be
    /// started the tab stays open in `Initializing` and the error is shown
    /// inline and returned.
    pub fn restart_session(&mut self, id: &SessionId) -> Result<()> {
        let session = self.sessions.get_mut(id).ok_or_else(|| not_found(id))?;

        if let Some(completion) = self.broker.fail(session, "Process restarted") {
            self.events.publish(SessionEvent::RequestCompleted(completion));
        }
        if let Some(process) = session.take_process() {
            process.terminate(self.config.terminate_timeout());
        }

        let previous = session.mode();
        session.reset_for_restart();
        if previous != session.mode() {
            self.events.publish(SessionEvent::ModeChanged {
                session_id: id.clone(),
                mode: session.mode(),
            });
        }

        let generation = session.next_generation();
        match self.spawner.spawn(id, generation, self.process_events.clone()) {
            Ok(handle) => {
                session.attach_process(handle);
                info!("Restarted session {} (generation {})", id.short(), generation);
                self.events.publish(SessionEvent::Restarted {
                    session_id: id.clone(),
                    generation,
                });
                Ok(())
            }
            Err(e) => {
                let err = Error::ProcessRestartFailed {
                    session_id: id.to_string(),
                    reason: e.to_string(),
                };
                error!("{}", err);
                let message = err.to_string();
                session.append_notice(&message);
                if let Some(completion) = self.broker.fail(session, &message) {
                    self.events.publish(SessionEvent::RequestCompleted(completion));
                }
                self.events.publish(SessionEvent::Notice {
                    session_id: id.clone(),
                    message: message.clone(),
                });
                self.events.publish(SessionEvent::RestartFailed {
                    session_id: id.clone(),
                    message,
                });
                Err(err)
            }
        }
    }

    /// Terminate every process and fail every pending request
    pub fn shutdown(&mut self) {
        info!("Shutting down {} session(s)", self.sessions.len());
        let grace = self.config.terminate_timeout();
        for id in std::mem::take(&mut self.order) {
            let Some(mut session) = self.sessions.remove(&id) else {
                continue;
            };
            if let Some(completion) = self.broker.fail(&mut session, "Shutting down") {
                self.events.publish(SessionEvent::RequestCompleted(completion));
            }
            if let Some(process) = session.take_process() {
                process.terminate(grace);
            }
            self.events.publish(SessionEvent::Closed { session_id: id });
        }
        self.current = None;
    }

    // === Interactive input ===

    pub fn handle_character(&mut self, id: &SessionId, ch: char) -> Result<bool> {
        let session = self.sessions.get_mut(id).ok_or_else(|| not_found(id))?;
        Ok(self.dispatcher.handle_character(session, ch))
    }

    pub fn handle_erase(&mut self, id: &SessionId, caret: usize) -> Result<EraseResult> {
        let session = self.sessions.get_mut(id).ok_or_else(|| not_found(id))?;
        Ok(self.dispatcher.handle_erase(session, caret))
    }

    /// Submit the current input line; failures are also shown inline
    pub fn submit_line(&mut self, id: &SessionId) -> Result<Submission> {
        let session = self.sessions.get_mut(id).ok_or_else(|| not_found(id))?;
        match self.dispatcher.submit_line(session) {
            Ok(submission) => {
                if submission == Submission::Clear {
                    self.events.publish(SessionEvent::Cleared {
                        session_id: id.clone(),
                    });
                }
                Ok(submission)
            }
            Err(e) => {
                warn!("Input for session {} rejected: {}", id.short(), e);
                session.append_notice(&e.to_string());
                self.events.publish(SessionEvent::Notice {
                    session_id: id.clone(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Type `line` character by character, then submit it
    pub fn send_line(&mut self, id: &SessionId, line: &str) -> Result<Submission> {
        for ch in line.chars() {
            self.handle_character(id, ch)?;
        }
        self.submit_line(id)
    }

    // === Background requests ===

    /// Start a background request on a specific session
    pub fn execute(&mut self, id: &SessionId, command: BackgroundCommand) -> Result<()> {
        let session = self.sessions.get_mut(id).ok_or_else(|| not_found(id))?;
        self.broker.execute(session, command).inspect_err(|e| {
            debug!("Background request on {} rejected: {}", id.short(), e);
        })
    }

    /// Start a background request on the current session
    pub fn execute_on_current(&mut self, command: BackgroundCommand) -> Result<()> {
        let id = self.current.clone().ok_or(Error::NoActiveSession)?;
        self.execute(&id, command)
    }

    pub fn execute_background_command(&mut self, command: &str, kind: RequestKind) -> Result<()> {
        self.execute_on_current(BackgroundCommand::new(kind, [command])?)
    }

    pub fn read_file(&mut self, path: &str) -> Result<()> {
        self.execute_on_current(BackgroundCommand::read_file(path)?)
    }

    pub fn write_file(&mut self, path: &str, content: &str) -> Result<()> {
        self.execute_on_current(BackgroundCommand::write_file(path, content)?)
    }

    pub fn change_directory(&mut self, path: &str) -> Result<()> {
        self.execute_on_current(BackgroundCommand::change_directory(path))
    }

    pub fn list_directory(&mut self) -> Result<()> {
        self.execute_on_current(BackgroundCommand::list_directory())
    }

    /// Ask collaborators tracking the current session to list it again
    pub fn request_directory_refresh(&self) {
        self.events.publish(SessionEvent::DirectoryRefreshRequested);
    }

    // === Process events ===

    /// Apply one event from a session process
    pub fn handle_process_event(&mut self, event: ProcessEvent) {
        let id = event.session_id().clone();
        let Some(session) = self.sessions.get_mut(&id) else {
            debug!("Dropping event for closed session {}", id.short());
            return;
        };
        if event.generation() != session.generation() {
            debug!(
                "Dropping event from stale process of session {} (generation {} != {})",
                id.short(),
                event.generation(),
                session.generation()
            );
            return;
        }

        match event {
            ProcessEvent::Stdout { text, .. } => {
                let update = session.append_output(OutputStream::Stdout, &text, &self.classifier);
                publish_update(&self.events, &id, OutputStream::Stdout, &update);
                if let Some(completion) = self.broker.on_stdout(session, &update.text, &self.classifier)
                {
                    publish_completion(&self.events, completion);
                }
            }
            ProcessEvent::Stderr { text, .. } => {
                let update = session.append_output(OutputStream::Stderr, &text, &self.classifier);
                self.broker.on_stderr(session, &update.text);
                publish_update(&self.events, &id, OutputStream::Stderr, &update);
            }
            ProcessEvent::WriteFailed { reason, .. } => {
                let message = Error::WriteFailed {
                    session_id: id.to_string(),
                    reason,
                }
                .to_string();
                session.append_notice(&message);
                if let Some(completion) = self.broker.fail(session, &message) {
                    publish_completion(&self.events, completion);
                }
                self.events.publish(SessionEvent::Notice {
                    session_id: id.clone(),
                    message,
                });
            }
            ProcessEvent::Exited {
                exit_code, normal, ..
            } => self.handle_exit(&id, exit_code, normal),
        }
    }

    fn handle_exit(&mut self, id: &SessionId, exit_code: Option<i32>, normal: bool) {
        let Some(session) = self.sessions.get_mut(id) else {
            return;
        };
        session.detach_process(exit_code, normal);

        let notice = format!(
            "--- process terminated {} (exit code {}) ---",
            if normal { "normally" } else { "unexpectedly" },
            exit_code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
        );
        session.append_notice(&notice);
        self.events.publish(SessionEvent::ProcessExited {
            session_id: id.clone(),
            exit_code,
            normal,
        });
        self.events.publish(SessionEvent::Notice {
            session_id: id.clone(),
            message: notice,
        });

        let crash = Error::ProcessCrashed {
            session_id: id.to_string(),
            exit_code,
        };
        if let Some(completion) = self.broker.fail(session, &crash.to_string()) {
            publish_completion(&self.events, completion);
        }

        if !self.config.restart_on_exit {
            return;
        }
        if session.restart_attempts() >= self.config.max_restart_attempts {
            let message = format!(
                "Not restarting after {} attempts without reaching the shell prompt",
                session.restart_attempts()
            );
            warn!("Session {}: {}", id.short(), message);
            session.append_notice(&message);
            self.events.publish(SessionEvent::Notice {
                session_id: id.clone(),
                message,
            });
            return;
        }
        if let Err(e) = self.restart_session(id) {
            warn!("Automatic restart of session {} failed: {}", id.short(), e);
        }
    }
}

fn not_found(id: &SessionId) -> Error {
    Error::SessionNotFound {
        session_id: id.to_string(),
    }
}

fn publish_update(
    events: &SessionEventBus,
    id: &SessionId,
    stream: OutputStream,
    update: &OutputUpdate,
) {
    if update.screen_reset {
        events.publish(SessionEvent::Cleared {
            session_id: id.clone(),
        });
    }
    if !update.text.is_empty() {
        events.publish(SessionEvent::Output {
            session_id: id.clone(),
            stream,
            text: update.text.clone(),
        });
    }
    if let Some(mode) = update.mode_changed {
        debug!("Session {} is now {}", id.short(), mode);
        events.publish(SessionEvent::ModeChanged {
            session_id: id.clone(),
            mode,
        });
    }
    if let Some(path) = &update.path_changed {
        events.publish(SessionEvent::PathChanged {
            session_id: id.clone(),
            path: path.clone(),
        });
    }
}

fn publish_completion(events: &SessionEventBus, completion: BackgroundCompletion) {
    events.publish(SessionEvent::RequestCompleted(completion));
}
