//! Terminal text handling
//!
//! Prompt classification, output normalization and interactive input
//! dispatch. These operate on a session's transcript and never touch
//! process I/O directly.

pub mod input;
pub mod output;
pub mod prompt;

// Re-exports for convenience
pub use input::{EraseResult, InteractiveDispatcher, Submission};
pub use output::{strip_ansi_codes, NormalizedOutput, OutputNormalizer, Utf8Decoder};
pub use prompt::{
    normalize_path, Classification, PromptClassifier, PromptPattern, PromptTable, ROOT_MARKER,
};
