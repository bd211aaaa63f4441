//! shellmux - session multiplexer for prompt-based shell processes
//!
//! Drives one external shell-like process per terminal tab, while file
//! explorer and editor panels reuse the same process to list directories
//! and read or write files. There is no structured channel: the only
//! signal of what the process expects is the prompt text it prints.
//!
//! ## Module Organization
//!
//! - [`terminal`] - Prompt classification, output normalization, keystroke dispatch
//! - [`session`] - Per-tab transcript, mode, input offset and working directory
//! - [`broker`] - Single-flight background requests with prompt-based completion
//! - [`manager`] - Tab collection, lifecycle and the collaborator API
//! - [`runtime`] - Single-threaded dispatcher task and its async handle
//! - [`process`] - Process spawning and I/O tasks
//! - [`events`] - Broadcast of session events to UI collaborators
//! - [`commands`] - Shell commands behind collaborator operations
//! - [`listing`] - Directory listing parser and explorer path helpers
//! - [`config`] - TOML configuration
//! - [`mod@error`] - Error types and Result aliases
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use shellmux::{runtime, ChildProcessSpawner, Config};
//!
//! # async fn demo() -> shellmux::Result<()> {
//! let config = Config::default();
//! let spawner = Arc::new(ChildProcessSpawner::new(config.process.clone()));
//! let (handle, _task) = runtime::start(&config, spawner)?;
//!
//! let mut events = handle.subscribe();
//! handle.list_directory().await?;
//! while let Some(event) = events.recv().await {
//!     if let shellmux::SessionEvent::RequestCompleted(done) = event {
//!         println!("{}", done.text);
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! - **Dispatcher task:** owns every session and applies one event at a time
//! - **Per-process tasks:** one reader per output stream, one stdin writer,
//!   one supervisor handling exit and termination
//!
//! Tasks talk to the dispatcher over `tokio::mpsc` channels; collaborators
//! receive results over a `tokio::broadcast` event bus.

#![allow(unexpected_cfgs)]

#[macro_use]
extern crate tracing;

pub mod broker;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod listing;
pub mod manager;
pub mod models;
pub mod process;
pub mod runtime;
pub mod session;
pub mod terminal;

// Re-exports for core functionality
pub use broker::BackgroundRequestBroker;
pub use commands::BackgroundCommand;
pub use config::loader::ConfigLoader;
pub use config::Config;
pub use error::{Error, Result};
pub use events::{SessionEvent, SessionEventBus};
pub use manager::SessionManager;
pub use models::{BackgroundCompletion, InputMode, RequestKind, SessionId};
pub use process::{ChildProcessSpawner, ProcessSpawner};
pub use runtime::ManagerHandle;
pub use session::{Session, SessionSnapshot};

// Version information
/// The current version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The package name from Cargo.toml
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Load configuration from the default locations and report what was found
pub fn init() -> Result<Config> {
    info!("Initializing {} v{}", NAME, VERSION);
    let mut loader = ConfigLoader::new();
    let config = loader.load()?;
    match loader.current_path() {
        Some(path) => info!("Using configuration from {}", path.display()),
        None => info!("Using default configuration"),
    }
    if !config.process.executable.exists() {
        warn!(
            "Session executable {} does not exist yet",
            config.process.executable.display()
        );
    }
    Ok(config)
}
