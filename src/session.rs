//! Session state
//!
//! One tab's process plus everything derived from its output: the
//! transcript, the inferred input mode, the input offset, the hidden
//! password buffer, the working directory and the in-flight background
//! request.
//!
//! A session is only ever mutated by the dispatcher, one event at a time.

use crate::error::{Error, Result};
use crate::models::{BackgroundRequest, InputMode, ProcessState, RequestKind, SessionId};
use crate::process::ProcessHandle;
use crate::terminal::output::{NormalizedOutput, OutputNormalizer};
use crate::terminal::prompt::{PromptClassifier, ROOT_MARKER};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Prefix for inline notices written into a transcript
pub const NOTICE_PREFIX: &str = "[shellmux]";

/// Which process stream a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// What changed when output was appended
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputUpdate {
    /// Normalized text that was appended
    pub text: String,
    pub screen_reset: bool,
    pub mode_changed: Option<InputMode>,
    pub path_changed: Option<String>,
}

/// Serializable view of a session for collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub mode: InputMode,
    pub current_path: String,
    pub input_start: usize,
    pub transcript_len: usize,
    pub pending_request: Option<RequestKind>,
    pub running: bool,
    pub pid: Option<u32>,
    pub generation: u64,
    pub restart_attempts: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct Session {
    id: SessionId,
    transcript: String,
    mode: InputMode,
    input_start: usize,
    /// Where prompt classification starts; moves on restart so prompts
    /// printed by a previous process are not mistaken for current ones
    classify_origin: usize,
    password_buffer: Zeroizing<String>,
    current_path: String,
    pending: Option<BackgroundRequest>,
    process: Option<ProcessHandle>,
    process_state: ProcessState,
    generation: u64,
    restart_attempts: u32,
    created_at: DateTime<Utc>,
    stdout: OutputNormalizer,
    stderr: OutputNormalizer,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            transcript: String::new(),
            mode: InputMode::Initializing,
            input_start: 0,
            classify_origin: 0,
            password_buffer: Zeroizing::new(String::new()),
            current_path: ROOT_MARKER.to_string(),
            pending: None,
            process: None,
            process_state: ProcessState::new(),
            generation: 0,
            restart_attempts: 0,
            created_at: Utc::now(),
            stdout: OutputNormalizer::new(),
            stderr: OutputNormalizer::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn input_start(&self) -> usize {
        self.input_start
    }

    /// Editable text after `input_start`
    pub fn input_tail(&self) -> &str {
        &self.transcript[self.input_start..]
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    /// Number of characters held in the password buffer
    pub fn password_len(&self) -> usize {
        self.password_buffer.chars().count()
    }

    pub fn pending_request(&self) -> Option<&BackgroundRequest> {
        self.pending.as_ref()
    }

    pub fn process_state(&self) -> &ProcessState {
        &self.process_state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn restart_attempts(&self) -> u32 {
        self.restart_attempts
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether a process is running and accepting stdin
    pub fn is_running(&self) -> bool {
        self.process_state.is_running()
            && self.process.as_ref().is_some_and(ProcessHandle::is_writable)
    }

    // === Process lifecycle ===

    /// Generation number for the next process
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    pub fn attach_process(&mut self, handle: ProcessHandle) {
        self.process_state.mark_started(handle.pid());
        self.process = Some(handle);
    }

    /// Record the exit and give up the handle
    pub fn detach_process(&mut self, exit_code: Option<i32>, normal: bool) -> Option<ProcessHandle> {
        self.process_state.mark_exited(exit_code, normal);
        self.process.take()
    }

    /// Take the handle for termination
    pub fn take_process(&mut self) -> Option<ProcessHandle> {
        self.process.take()
    }

    /// Prepare for a new process: back to Initializing, history kept
    pub fn reset_for_restart(&mut self) {
        self.mode = InputMode::Initializing;
        self.password_buffer.clear();
        self.classify_origin = self.transcript.len();
        self.input_start = self.transcript.len();
        self.stdout.reset();
        self.stderr.reset();
        self.restart_attempts += 1;
    }

    pub fn write_stdin(&self, data: &[u8]) -> Result<()> {
        match &self.process {
            Some(process) if self.is_running() => process.write(&self.id, data),
            _ => Err(Error::StdinUnavailable {
                session_id: self.id.to_string(),
            }),
        }
    }

    // === Output ===

    /// Append process output and re-derive mode, input offset and path
    pub fn append_output(
        &mut self,
        stream: OutputStream,
        chunk: &str,
        classifier: &PromptClassifier,
    ) -> OutputUpdate {
        let normalized = match stream {
            OutputStream::Stdout => self.stdout.push(chunk),
            OutputStream::Stderr => self.stderr.push(chunk),
        };
        self.append_normalized(normalized, classifier)
    }

    fn append_normalized(
        &mut self,
        output: NormalizedOutput,
        classifier: &PromptClassifier,
    ) -> OutputUpdate {
        if output.screen_reset {
            self.clear_transcript();
        } else if output.text.is_empty() {
            return OutputUpdate::default();
        }

        self.transcript.push_str(&output.text);
        let (mode_changed, path_changed) = self.reclassify(classifier);

        OutputUpdate {
            text: output.text,
            screen_reset: output.screen_reset,
            mode_changed,
            path_changed,
        }
    }

    fn reclassify(&mut self, classifier: &PromptClassifier) -> (Option<InputMode>, Option<String>) {
        let view = &self.transcript[self.classify_origin..];
        let classification = classifier.classify(view, self.is_running());
        let path = classifier.extract_path(view);

        let classified = self.classify_origin + classification.input_start;
        self.input_start = if classified > self.input_start {
            classified
        } else {
            self.transcript.len()
        };

        let previous = self.mode;
        self.mode = classification.mode;
        if previous.is_password() && !self.mode.is_password() {
            self.password_buffer.clear();
        }
        if classification.matched && self.mode == InputMode::Normal {
            self.restart_attempts = 0;
        }

        let path_changed = match path {
            Some(path) if path != self.current_path => {
                self.current_path = path.clone();
                Some(path)
            }
            _ => None,
        };
        let mode_changed = (previous != self.mode).then_some(self.mode);
        (mode_changed, path_changed)
    }

    /// Write an inline notice on its own line; it becomes history
    pub fn append_notice(&mut self, message: &str) {
        if !self.transcript.is_empty() && !self.transcript.ends_with('\n') {
            self.transcript.push('\n');
        }
        self.transcript.push_str(NOTICE_PREFIX);
        self.transcript.push(' ');
        self.transcript.push_str(message);
        self.transcript.push('\n');
        self.input_start = self.transcript.len();
    }

    // === Editing, used by the dispatchers ===

    pub(crate) fn push_input(&mut self, ch: char) {
        self.transcript.push(ch);
    }

    /// Remove the character ending at `caret`, never at or before `input_start`
    pub(crate) fn erase_before(&mut self, caret: usize) -> bool {
        if caret <= self.input_start
            || caret > self.transcript.len()
            || !self.transcript.is_char_boundary(caret)
        {
            return false;
        }
        match self.transcript[..caret].chars().next_back() {
            Some(ch) => {
                let start = caret - ch.len_utf8();
                self.transcript.replace_range(start..caret, "");
                true
            }
            None => false,
        }
    }

    /// Replace the unsent tail with `text`, which then becomes history
    pub(crate) fn replace_input_tail(&mut self, text: &str) {
        self.transcript.truncate(self.input_start);
        self.transcript.push_str(text);
        self.input_start = self.transcript.len();
    }

    pub(crate) fn clear_transcript(&mut self) {
        self.transcript.clear();
        self.input_start = 0;
        self.classify_origin = 0;
    }

    pub(crate) fn push_password(&mut self, ch: char) {
        self.password_buffer.push(ch);
    }

    pub(crate) fn pop_password(&mut self) -> bool {
        self.password_buffer.pop().is_some()
    }

    pub(crate) fn password(&self) -> &str {
        &self.password_buffer
    }

    pub(crate) fn clear_password(&mut self) {
        self.password_buffer.clear();
    }

    // === Background requests ===

    pub(crate) fn set_pending(&mut self, request: BackgroundRequest) {
        self.pending = Some(request);
    }

    pub(crate) fn pending_mut(&mut self) -> Option<&mut BackgroundRequest> {
        self.pending.as_mut()
    }

    pub(crate) fn take_pending(&mut self) -> Option<BackgroundRequest> {
        self.pending.take()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            id: self.id.clone(),
            mode: self.mode,
            current_path: self.current_path.clone(),
            input_start: self.input_start,
            transcript_len: self.transcript.len(),
            pending_request: self.pending.as_ref().map(|r| r.kind.clone()),
            running: self.is_running(),
            pid: self.process.as_ref().and_then(ProcessHandle::pid),
            generation: self.generation,
            restart_attempts: self.restart_attempts,
            created_at: self.created_at,
        }
    }
}
