//! Session Event System
//!
//! Fans session activity out to any number of UI collaborators (terminal
//! view, explorer, editor). Subscribers that fall behind lose the oldest
//! events and are told how many they missed.

use crate::models::{BackgroundCompletion, InputMode, SessionId};
use crate::session::OutputStream;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Events published by the session manager
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A tab was opened
    Created { session_id: SessionId },
    /// Text was appended to a transcript
    Output {
        session_id: SessionId,
        stream: OutputStream,
        text: String,
    },
    /// An inline notice was written into a transcript
    Notice { session_id: SessionId, message: String },
    /// The transcript was reset by a clear command or screen reset
    Cleared { session_id: SessionId },
    ModeChanged {
        session_id: SessionId,
        mode: InputMode,
    },
    PathChanged { session_id: SessionId, path: String },
    ProcessExited {
        session_id: SessionId,
        exit_code: Option<i32>,
        normal: bool,
    },
    /// A new process was started for an existing tab
    Restarted { session_id: SessionId, generation: u64 },
    RestartFailed { session_id: SessionId, message: String },
    SpawnFailed { session_id: SessionId, message: String },
    /// A tab was closed
    Closed { session_id: SessionId },
    CurrentChanged { session_id: SessionId },
    /// A background request finished
    RequestCompleted(BackgroundCompletion),
    /// Collaborators tracking the current session should list it again
    DirectoryRefreshRequested,
}

impl SessionEvent {
    /// Session the event concerns, if any
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            SessionEvent::Created { session_id }
            | SessionEvent::Output { session_id, .. }
            | SessionEvent::Notice { session_id, .. }
            | SessionEvent::Cleared { session_id }
            | SessionEvent::ModeChanged { session_id, .. }
            | SessionEvent::PathChanged { session_id, .. }
            | SessionEvent::ProcessExited { session_id, .. }
            | SessionEvent::Restarted { session_id, .. }
            | SessionEvent::RestartFailed { session_id, .. }
            | SessionEvent::SpawnFailed { session_id, .. }
            | SessionEvent::Closed { session_id }
            | SessionEvent::CurrentChanged { session_id } => Some(session_id),
            SessionEvent::RequestCompleted(completion) => Some(&completion.session_id),
            SessionEvent::DirectoryRefreshRequested => None,
        }
    }
}

/// Subscription handle for receiving session events
pub struct SessionEventSubscription {
    receiver: broadcast::Receiver<SessionEvent>,
}

impl SessionEventSubscription {
    /// Receive the next event, waiting if necessary
    pub async fn recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    warn!("Session event subscriber lagged by {} events", count);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Option<SessionEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => return None,
                Err(broadcast::error::TryRecvError::Lagged(count)) => {
                    warn!("Session event subscriber lagged by {} events", count);
                }
            }
        }
    }
}

/// Event bus for publishing and subscribing to session events
#[derive(Clone)]
pub struct SessionEventBus {
    sender: broadcast::Sender<SessionEvent>,
    /// Subscriptions handed out (for monitoring)
    subscriptions: Arc<AtomicUsize>,
}

impl SessionEventBus {
    /// Create a new event bus with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            subscriptions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> SessionEventSubscription {
        self.subscriptions.fetch_add(1, Ordering::Relaxed);
        SessionEventSubscription {
            receiver: self.sender.subscribe(),
        }
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SessionEvent) {
        // No receivers is not an error
        let _ = self.sender.send(event);
    }

    /// Number of live receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Total subscriptions handed out so far
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.load(Ordering::Relaxed)
    }
}

impl Default for SessionEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
