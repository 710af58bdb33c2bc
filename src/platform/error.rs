//! Error types for snapshot providers and signal delivery

use thiserror::Error;

use super::signal::Signal;

/// A snapshot, detail or group fetch failed
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}")]
    Exit {
        command: String,
        status: std::process::ExitStatus,
    },

    #[error("process {0} not found")]
    NotFound(i32),

    #[error("unexpected output: {0:?}")]
    Parse(String),

    #[cfg(target_os = "linux")]
    #[error("failed to read /proc: {0}")]
    Proc(#[from] procfs::ProcError),
}

/// Delivering a signal to a process failed
#[derive(Debug, Error)]
pub enum SignalError {
    #[error("invalid PID: {0}")]
    InvalidPid(i32),

    #[error("unknown signal: {0}")]
    UnknownSignal(String),

    #[error("failed to send signal {signal} to PID {pid}: {source}")]
    Send {
        pid: i32,
        signal: Signal,
        #[source]
        source: nix::errno::Errno,
    },
}

/// Reading or parsing a diagnostic report failed
#[derive(Debug, Error)]
pub enum CrashError {
    #[error("invalid time window {0:?} (use e.g. 24h or 7d)")]
    Window(String),

    #[error("unsupported report format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("empty report: {0}")]
    Empty(String),

    #[error("failed to parse .ips header: {0}")]
    Header(#[from] serde_json::Error),
}
