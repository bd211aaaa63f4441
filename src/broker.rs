//! Background request broker
//!
//! Runs collaborator commands through a session's shell and captures their
//! output. Only one background request may be in flight across all
//! sessions; the broker owns that slot.
//!
//! Completion has no framing: a step is done once its captured output ends
//! with a fresh main shell prompt. The text before that prompt is the
//! step's result.

use crate::commands::BackgroundCommand;
use crate::error::{Error, Result};
use crate::models::{BackgroundCompletion, BackgroundRequest, InputMode, SessionId};
use crate::session::Session;
use crate::terminal::prompt::PromptClassifier;

#[derive(Debug, Default)]
pub struct BackgroundRequestBroker {
    /// Session currently holding the single-flight slot
    slot: Option<SessionId>,
}

impl BackgroundRequestBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot_holder(&self) -> Option<&SessionId> {
        self.slot.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_some()
    }

    /// Start a background request on `session`.
    ///
    /// Rejections leave the session untouched. On acceptance the first
    /// command replaces any unsent input in the transcript and is written
    /// to stdin.
    pub fn execute(&mut self, session: &mut Session, command: BackgroundCommand) -> Result<()> {
        if !session.is_running() {
            return Err(Error::StdinUnavailable {
                session_id: session.id().to_string(),
            });
        }
        if let Some(holder) = &self.slot {
            return Err(Error::RequestSlotBusy {
                holder: holder.to_string(),
            });
        }
        if session.mode() != InputMode::Normal {
            return Err(Error::SessionNotReady {
                session_id: session.id().to_string(),
                mode: session.mode().to_string(),
            });
        }

        let (kind, mut queue) = command.into_parts();
        let first = queue
            .pop_front()
            .ok_or_else(|| Error::Other("background command cannot be empty".to_string()))?;

        session.write_stdin(format!("{}\n", first).as_bytes())?;
        let sent_at_offset = session.transcript().len();
        session.replace_input_tail(&format!("{}\n", first));

        info!(
            "Background {} accepted on session {} ({} step(s))",
            kind,
            session.id().short(),
            queue.len() + 1
        );
        session.set_pending(BackgroundRequest::new(kind, queue, sent_at_offset));
        self.slot = Some(session.id().clone());
        Ok(())
    }

    /// Feed normalized stdout text that was just appended to `session`.
    ///
    /// Returns the completion once the last step finishes.
    pub fn on_stdout(
        &mut self,
        session: &mut Session,
        text: &str,
        classifier: &PromptClassifier,
    ) -> Option<BackgroundCompletion> {
        let mode = session.mode();
        let request = session.pending_mut()?;
        request.output_buffer.push_str(text);

        if mode != InputMode::Normal {
            return None;
        }
        let step_result = take_step_result(&mut request.output_buffer, classifier)?;
        request.step_results.push(step_result);

        if request.saw_stderr() {
            let message = request.error_buffer.trim().to_string();
            return self.finish(session, false, Some(message));
        }

        match request.command_queue.pop_front() {
            Some(next) => {
                debug!("Sending next step of {}: {}", request.kind, next);
                match session.write_stdin(format!("{}\n", next).as_bytes()) {
                    Ok(()) => {
                        session.replace_input_tail(&format!("{}\n", next));
                        None
                    }
                    Err(e) => self.finish(session, false, Some(e.to_string())),
                }
            }
            None => self.finish(session, true, None),
        }
    }

    /// Record stderr text for the pending request, if any
    pub fn on_stderr(&mut self, session: &mut Session, text: &str) {
        if let Some(request) = session.pending_mut() {
            request.error_buffer.push_str(text);
        }
    }

    /// Force the session's pending request to a failed outcome
    pub fn fail(&mut self, session: &mut Session, message: &str) -> Option<BackgroundCompletion> {
        session.pending_request()?;
        warn!(
            "Failing background request on session {}: {}",
            session.id().short(),
            message
        );
        self.finish(session, false, Some(message.to_string()))
    }

    fn finish(
        &mut self,
        session: &mut Session,
        success: bool,
        error_message: Option<String>,
    ) -> Option<BackgroundCompletion> {
        let request = session.take_pending()?;
        if self.slot.as_ref() == Some(session.id()) {
            self.slot = None;
        }

        let mut text = request.result_text();
        if !success && text.is_empty() {
            text = request.output_buffer.clone();
        }
        debug!(
            "Background {} on session {} finished (success {}) after {}ms",
            request.kind,
            session.id().short(),
            success,
            (chrono::Utc::now() - request.sent_at).num_milliseconds()
        );

        Some(BackgroundCompletion {
            session_id: session.id().clone(),
            target: BackgroundCompletion::target_for(session.id(), &request.kind),
            text,
            success,
            error_message,
            kind: request.kind,
        })
    }
}

/// Split off a finished step: the buffer must end with a main prompt
/// followed by nothing but whitespace
fn take_step_result(buffer: &mut String, classifier: &PromptClassifier) -> Option<String> {
    let (start, end) = classifier.last_normal_prompt(buffer)?;
    if !buffer[end..].trim().is_empty() {
        return None;
    }
    let result = buffer[..start].to_string();
    buffer.clear();
    Some(result)
}
