//! Prompt Classification
//!
//! Infers what the shell process is waiting for from the text it printed.
//! The process offers no structured handshake, so the most recent prompt in
//! the transcript is the only signal for "ready for input" and for which
//! kind of input is expected.
//!
//! The classifier holds an ordered table of `(pattern, mode)` entries and is
//! pure: the same transcript always yields the same [`Classification`].

use crate::error::{Error, Result};
use crate::models::InputMode;
use once_cell::sync::Lazy;
use regex::Regex;

/// Working directory shown before any main prompt has been seen
pub const ROOT_MARKER: &str = "~";

/// Default size of the trailing window scanned on every classification
pub const DEFAULT_CLASSIFY_WINDOW: usize = 2000;

/// Login prompt asking for a user name
pub const USERNAME_PROMPT: &str = "host@login:Username$ ";

/// Login prompt asking for a password
pub const PASSWORD_PROMPT: &str = "host@login:Password$ ";

const SUDO_PATTERN: &str = r"\[sudo\] password for [^\n]+?: ";

/// `<system>@<host>:<path>$ ` where the path is empty or starts at `~` or `/`
const NORMAL_PATTERN: &str = r"[\w.-]+@[\w.-]+:(?:[~/][^\n$]*)?\$ ";

static REPEATED_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/{2,}").expect("separator regex is valid"));

/// One entry of the prompt table
#[derive(Debug, Clone)]
pub struct PromptPattern {
    name: String,
    mode: InputMode,
    pattern: Regex,
}

impl PromptPattern {
    pub fn new(name: impl Into<String>, pattern: &str, mode: InputMode) -> Result<Self> {
        let name = name.into();
        let pattern = Regex::new(pattern).map_err(|e| Error::InvalidPromptPattern {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            name,
            mode,
            pattern,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn regex(&self) -> &Regex {
        &self.pattern
    }

    /// Byte range of the last match in `text`
    fn last_match(&self, text: &str) -> Option<(usize, usize)> {
        self.pattern
            .find_iter(text)
            .last()
            .map(|m| (m.start(), m.end()))
    }
}

/// Ordered table of prompt patterns
#[derive(Debug, Clone, Default)]
pub struct PromptTable {
    patterns: Vec<PromptPattern>,
}

impl PromptTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the built-in login, sudo and main shell prompts
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        let defaults = [
            ("username", regex::escape(USERNAME_PROMPT), InputMode::LoginUsername),
            ("password", regex::escape(PASSWORD_PROMPT), InputMode::LoginPassword),
            ("sudo", SUDO_PATTERN.to_string(), InputMode::SudoPassword),
            ("shell", NORMAL_PATTERN.to_string(), InputMode::Normal),
        ];
        for (name, pattern, mode) in defaults {
            if let Err(e) = table.add_pattern(name, &pattern, mode) {
                warn!("Skipping built-in prompt pattern: {}", e);
            }
        }
        table
    }

    /// Append a pattern; later entries lose ties on equal end offsets
    pub fn add_pattern(&mut self, name: &str, pattern: &str, mode: InputMode) -> Result<()> {
        self.patterns.push(PromptPattern::new(name, pattern, mode)?);
        Ok(())
    }

    pub fn patterns(&self) -> &[PromptPattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Result of classifying a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub mode: InputMode,
    /// Offset where user input begins
    pub input_start: usize,
    /// Whether any prompt pattern matched
    pub matched: bool,
}

/// Latest-match-wins prompt classifier over a trailing window
#[derive(Debug, Clone)]
pub struct PromptClassifier {
    table: PromptTable,
    window: usize,
}

impl Default for PromptClassifier {
    fn default() -> Self {
        Self::new(PromptTable::with_defaults(), DEFAULT_CLASSIFY_WINDOW)
    }
}

impl PromptClassifier {
    pub fn new(table: PromptTable, window: usize) -> Self {
        Self {
            table,
            window: window.max(1),
        }
    }

    pub fn table(&self) -> &PromptTable {
        &self.table
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Classify the transcript.
    ///
    /// Every pattern is searched for its last occurrence inside the trailing
    /// window; the occurrence ending furthest into the text wins regardless
    /// of table order. Its end becomes `input_start`.
    pub fn classify(&self, transcript: &str, process_running: bool) -> Classification {
        let start = self.window_start(transcript);
        let tail = &transcript[start..];

        let mut best: Option<(usize, InputMode)> = None;
        for entry in self.table.patterns() {
            if let Some((_, end)) = entry.last_match(tail) {
                let end = start + end;
                if best.map_or(true, |(best_end, _)| end > best_end) {
                    best = Some((end, entry.mode()));
                }
            }
        }

        match best {
            Some((input_start, mode)) => Classification {
                mode,
                input_start,
                matched: true,
            },
            None if transcript.is_empty() && process_running => Classification {
                mode: InputMode::Initializing,
                input_start: 0,
                matched: false,
            },
            None => Classification {
                mode: InputMode::Normal,
                input_start: transcript.len(),
                matched: false,
            },
        }
    }

    /// Working directory from the last main shell prompt in the window
    pub fn extract_path(&self, transcript: &str) -> Option<String> {
        let start = self.window_start(transcript);
        let tail = &transcript[start..];
        self.last_normal_prompt(tail)
            .and_then(|(s, e)| path_from_prompt(&tail[s..e]))
    }

    /// Byte range of the last main shell prompt anywhere in `text`
    pub fn last_normal_prompt(&self, text: &str) -> Option<(usize, usize)> {
        self.table
            .patterns()
            .iter()
            .filter(|p| p.mode() == InputMode::Normal)
            .filter_map(|p| p.last_match(text))
            .max_by_key(|&(_, end)| end)
    }

    /// Start of the trailing window, moved forward to a char boundary
    fn window_start(&self, transcript: &str) -> usize {
        let mut start = transcript.len().saturating_sub(self.window);
        while !transcript.is_char_boundary(start) {
            start += 1;
        }
        start
    }
}

/// Text between the first `:` and the last `$` of a prompt, normalized
pub fn path_from_prompt(prompt: &str) -> Option<String> {
    let colon = prompt.find(':')?;
    let dollar = prompt.rfind('$')?;
    if dollar < colon {
        return None;
    }
    Some(normalize_path(&prompt[colon + 1..dollar]))
}

/// Empty becomes the root marker; repeated separators collapse
pub fn normalize_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return ROOT_MARKER.to_string();
    }
    REPEATED_SEPARATORS.replace_all(trimmed, "/").into_owned()
}
