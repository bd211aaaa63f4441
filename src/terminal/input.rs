//! Interactive Input Dispatch
//!
//! Translates keystrokes and line submissions into transcript edits and
//! stdin writes, subject to the session's inferred mode. In password modes
//! typed characters only reach a hidden buffer and are never echoed.

use crate::error::{Error, Result};
use crate::models::InputMode;
use crate::session::Session;
use zeroize::Zeroizing;

/// Outcome of an erase request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EraseResult {
    Erased,
    /// Cannot erase: the caret is inside history or nothing is left
    Rejected,
}

/// What a submitted line turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Visible input forwarded to the process
    Command(String),
    /// Hidden password input forwarded to the process
    Secret,
    /// The screen-clear command: transcript reset, command forwarded
    Clear,
}

/// Applies user input to a session
#[derive(Debug, Clone)]
pub struct InteractiveDispatcher {
    clear_command: String,
}

impl Default for InteractiveDispatcher {
    fn default() -> Self {
        Self::new("clear")
    }
}

impl InteractiveDispatcher {
    pub fn new(clear_command: impl Into<String>) -> Self {
        Self {
            clear_command: clear_command.into(),
        }
    }

    pub fn clear_command(&self) -> &str {
        &self.clear_command
    }

    /// Type one character. Control characters are ignored.
    pub fn handle_character(&self, session: &mut Session, ch: char) -> bool {
        if ch.is_control() {
            return false;
        }
        if session.mode().is_password() {
            session.push_password(ch);
        } else {
            session.push_input(ch);
        }
        true
    }

    /// Erase the character before `caret`.
    ///
    /// In password modes the last hidden character is dropped instead and
    /// the transcript is left alone.
    pub fn handle_erase(&self, session: &mut Session, caret: usize) -> EraseResult {
        let erased = if session.mode().is_password() {
            session.pop_password()
        } else {
            session.erase_before(caret)
        };
        if erased {
            EraseResult::Erased
        } else {
            EraseResult::Rejected
        }
    }

    /// Backspace at the end of the transcript
    pub fn handle_backspace(&self, session: &mut Session) -> EraseResult {
        let caret = session.transcript().len();
        self.handle_erase(session, caret)
    }

    /// Send the current input line to the process.
    ///
    /// Fails with `StdinUnavailable` when no process is running, and with
    /// `RequestSlotBusy` when the session is at its shell prompt but a
    /// background request owns it.
    pub fn submit_line(&self, session: &mut Session) -> Result<Submission> {
        if !session.is_running() {
            return Err(Error::StdinUnavailable {
                session_id: session.id().to_string(),
            });
        }
        if session.mode() == InputMode::Normal && session.pending_request().is_some() {
            return Err(Error::RequestSlotBusy {
                holder: session.id().to_string(),
            });
        }

        if session.mode().is_password() {
            let mut line = Zeroizing::new(String::with_capacity(session.password().len() + 1));
            line.push_str(session.password());
            line.push('\n');
            session.write_stdin(line.as_bytes())?;

            debug!(
                "Submitted hidden input for session {} ({} chars)",
                session.id().short(),
                session.password_len()
            );
            session.clear_password();
            session.replace_input_tail("\n");
            return Ok(Submission::Secret);
        }

        let input = session.input_tail().trim().to_string();
        session.write_stdin(format!("{}\n", input).as_bytes())?;

        if input.eq_ignore_ascii_case(&self.clear_command) {
            session.clear_transcript();
            return Ok(Submission::Clear);
        }

        session.replace_input_tail(&format!("{}\n", input));
        Ok(Submission::Command(input))
    }
}
