//! Process signal helpers

use crate::error::{Error, Result};

/// Signals sent while tearing a session process down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Termination signal (graceful shutdown)
    Terminate,
    /// Kill signal (forceful termination)
    Kill,
}

/// Send `signal` to the process with the given pid
#[cfg(unix)]
pub fn send_signal(pid: u32, signal: Signal) -> Result<()> {
    use nix::sys::signal::{kill, Signal as NixSignal};
    use nix::unistd::Pid;

    let nix_signal = match signal {
        Signal::Terminate => NixSignal::SIGTERM,
        Signal::Kill => NixSignal::SIGKILL,
    };

    kill(Pid::from_raw(pid as i32), nix_signal).map_err(|e| Error::SignalSendFailed {
        signal: format!("{:?}", signal),
        reason: e.to_string(),
    })
}

#[cfg(not(unix))]
pub fn send_signal(_pid: u32, signal: Signal) -> Result<()> {
    Err(Error::SignalSendFailed {
        signal: format!("{:?}", signal),
        reason: "signals are not supported on this platform".to_string(),
    })
}
