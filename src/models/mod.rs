//! Core data models for shellmux
//!
//! Plain data shared by the session, broker and manager layers: the
//! inferred input mode, session identifiers, background request records
//! and the process lifecycle record.

pub mod mode;
pub mod process_state;
pub mod request;
pub mod session_id;

// Re-exports for convenience
pub use mode::InputMode;
pub use process_state::{ProcessState, ProcessStatus};
pub use request::{BackgroundCompletion, BackgroundRequest, RequestKind};
pub use session_id::SessionId;
