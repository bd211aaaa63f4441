//! Output Decoding and Normalization
//!
//! Turns raw process output into transcript text: bytes are decoded as
//! UTF-8 with incomplete sequences carried across reads, then escape
//! sequences are stripped and screen resets detected.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest escape sequence held back while waiting for its terminator
const MAX_ESCAPE_LEN: usize = 64;

static ANSI_SEQUENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_c]")
        .expect("ANSI regex is valid")
});

static COMPLETE_ESCAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\x1b\[[0-?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_c])")
        .expect("escape regex is valid")
});

static SCREEN_RESET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x1b\[[23]J|\x1bc|\x0c").expect("reset regex is valid"));

/// Incremental UTF-8 decoder for one output stream
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `bytes` as possible.
    ///
    /// A multi-byte character split across reads is completed on the next
    /// call. Invalid bytes become U+FFFD.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::with_capacity(self.pending.len());
        let mut consumed = 0;

        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = consumed + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[consumed..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + len;
                        }
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        out
    }

    /// Flush whatever is left at end of stream
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Text ready to be appended to a transcript
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedOutput {
    pub text: String,
    /// The chunk contained a screen reset; `text` is what followed the last one
    pub screen_reset: bool,
}

/// Per-stream normalizer that tolerates escape sequences split across chunks
#[derive(Debug, Default)]
pub struct OutputNormalizer {
    carry: String,
}

impl OutputNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &str) -> NormalizedOutput {
        let mut input = std::mem::take(&mut self.carry);
        input.push_str(chunk);
        if let Some(pos) = incomplete_escape_start(&input) {
            self.carry = input.split_off(pos);
        }
        normalize(&input)
    }

    /// Drop any held-back partial sequence
    pub fn reset(&mut self) {
        self.carry.clear();
    }
}

fn incomplete_escape_start(text: &str) -> Option<usize> {
    let pos = text.rfind('\x1b')?;
    let rest = &text[pos..];
    if rest.len() > MAX_ESCAPE_LEN || COMPLETE_ESCAPE.is_match(rest) {
        None
    } else {
        Some(pos)
    }
}

/// Normalize one chunk of output.
pub fn normalize(chunk: &str) -> NormalizedOutput {
    let (body, screen_reset) = match SCREEN_RESET.find_iter(chunk).last() {
        Some(m) => (&chunk[m.end()..], true),
        None => (chunk, false),
    };

    let stripped = strip_ansi_codes(body);
    let text = stripped
        .replace("\r\n", "\n")
        .chars()
        .filter(|c| *c == '\n' || *c == '\t' || !c.is_control())
        .collect();

    NormalizedOutput { text, screen_reset }
}

/// Strip ANSI escape sequences from text
pub fn strip_ansi_codes(text: &str) -> String {
    ANSI_SEQUENCE.replace_all(text, "").into_owned()
}
