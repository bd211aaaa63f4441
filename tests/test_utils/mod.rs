//! Test Utilities and Mocks
//!
//! A scripted process spawner and a harness that drives a
//! [`SessionManager`] directly, standing in for the dispatcher task.

#![allow(dead_code)]


pub use fixtures::*;
pub use mock_spawner::MockSpawner;

use shellmux::events::SessionEventSubscription;
use shellmux::process::{ProcessEvent, ProcessEventReceiver};
use shellmux::{BackgroundCompletion, Config, SessionEvent, SessionId, SessionManager};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Manager plus everything needed to feed it process events by hand
pub struct Harness {
    pub manager: SessionManager,
    pub spawner: MockSpawner,
    pub events: SessionEventSubscription,
    /// Kept open so the manager's sender never fails
    pub process_rx: ProcessEventReceiver,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_spawner(config, MockSpawner::new())
    }

    pub fn with_spawner(config: Config, spawner: MockSpawner) -> Self {
        let (tx, process_rx) = mpsc::unbounded_channel();
        let manager = SessionManager::new(&config, Arc::new(spawner.clone()), tx)
            .expect("test config is valid");
        let events = manager.subscribe();
        Self {
            manager,
            spawner,
            events,
            process_rx,
        }
    }

    pub fn generation(&self, id: &SessionId) -> u64 {
        self.manager
            .session(id)
            .expect("session exists")
            .generation()
    }

    pub fn transcript(&self, id: &SessionId) -> String {
        self.manager
            .session(id)
            .expect("session exists")
            .transcript()
            .to_string()
    }

    pub fn stdout(&mut self, id: &SessionId, text: &str) {
        let generation = self.generation(id);
        self.manager.handle_process_event(ProcessEvent::Stdout {
            session_id: id.clone(),
            generation,
            text: text.to_string(),
        });
    }

    pub fn stderr(&mut self, id: &SessionId, text: &str) {
        let generation = self.generation(id);
        self.manager.handle_process_event(ProcessEvent::Stderr {
            session_id: id.clone(),
            generation,
            text: text.to_string(),
        });
    }

    pub fn exit(&mut self, id: &SessionId, exit_code: Option<i32>, normal: bool) {
        let generation = self.generation(id);
        self.manager.handle_process_event(ProcessEvent::Exited {
            session_id: id.clone(),
            generation,
            exit_code,
            normal,
        });
    }

    /// Open a session already sitting at the main prompt in `~`
    pub fn ready_session(&mut self) -> SessionId {
        let id = self.manager.create_session();
        self.stdout(&id, &format!("Welcome\n{}", prompt("~")));
        id
    }

    /// Everything written to the session's processes' stdin so far
    pub fn writes(&self, id: &SessionId) -> Vec<String> {
        self.spawner.take_writes(id)
    }

    /// Drain pending events
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Some(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    /// Drain pending events, keeping only request completions
    pub fn completions(&mut self) -> Vec<BackgroundCompletion> {
        self.drain_events()
            .into_iter()
            .filter_map(|event| match event {
                SessionEvent::RequestCompleted(completion) => Some(completion),
                _ => None,
            })
            .collect()
    }
}
