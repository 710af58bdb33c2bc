//! Signals that can be sent to a process

use std::fmt;

use nix::sys::signal;
use nix::unistd::Pid;

use super::error::SignalError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Hup,
    Int,
    Quit,
    Kill,
    Term,
    Usr1,
    Usr2,
    Stop,
    Cont,
}

impl Signal {
    /// Name without the SIG prefix
    pub fn short_name(self) -> &'static str {
        match self {
            Signal::Hup => "HUP",
            Signal::Int => "INT",
            Signal::Quit => "QUIT",
            Signal::Kill => "KILL",
            Signal::Term => "TERM",
            Signal::Usr1 => "USR1",
            Signal::Usr2 => "USR2",
            Signal::Stop => "STOP",
            Signal::Cont => "CONT",
        }
    }

    pub fn all() -> &'static [Signal] {
        &[
            Signal::Hup,
            Signal::Int,
            Signal::Quit,
            Signal::Kill,
            Signal::Term,
            Signal::Usr1,
            Signal::Usr2,
            Signal::Stop,
            Signal::Cont,
        ]
    }

    /// Parse `TERM`, `SIGTERM` or `sigterm`
    pub fn from_name(name: &str) -> Result<Self, SignalError> {
        let upper = name.to_uppercase();
        let short = upper.strip_prefix("SIG").unwrap_or(&upper);
        Self::all()
            .iter()
            .copied()
            .find(|s| s.short_name() == short)
            .ok_or_else(|| SignalError::UnknownSignal(short.to_string()))
    }

    fn to_nix(self) -> signal::Signal {
        match self {
            Signal::Hup => signal::Signal::SIGHUP,
            Signal::Int => signal::Signal::SIGINT,
            Signal::Quit => signal::Signal::SIGQUIT,
            Signal::Kill => signal::Signal::SIGKILL,
            Signal::Term => signal::Signal::SIGTERM,
            Signal::Usr1 => signal::Signal::SIGUSR1,
            Signal::Usr2 => signal::Signal::SIGUSR2,
            Signal::Stop => signal::Signal::SIGSTOP,
            Signal::Cont => signal::Signal::SIGCONT,
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SIG{}", self.short_name())
    }
}

/// Send a signal to a process. PIDs <= 0 are rejected rather than
/// broadcast to a process group.
pub fn send_signal(pid: i32, sig: Signal) -> Result<(), SignalError> {
    if pid <= 0 {
        return Err(SignalError::InvalidPid(pid));
    }
    signal::kill(Pid::from_raw(pid), sig.to_nix()).map_err(|source| SignalError::Send {
        pid,
        signal: sig,
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_signal_names() {
        assert_eq!(Signal::from_name("TERM").unwrap(), Signal::Term);
        assert_eq!(Signal::from_name("SIGKILL").unwrap(), Signal::Kill);
        assert_eq!(Signal::from_name("sighup").unwrap(), Signal::Hup);
        assert_eq!(Signal::from_name("usr2").unwrap(), Signal::Usr2);
    }

    #[test]
    fn test_unknown_signal() {
        let err = Signal::from_name("SIGWINCHX").unwrap_err();
        assert_eq!(err.to_string(), "unknown signal: WINCHX");
    }

    #[test]
    fn test_display() {
        assert_eq!(Signal::Term.to_string(), "SIGTERM");
        assert_eq!(Signal::Cont.to_string(), "SIGCONT");
    }

    #[test]
    fn test_invalid_pid_rejected() {
        let err = send_signal(0, Signal::Term).unwrap_err();
        assert_eq!(err.to_string(), "invalid PID: 0");
        assert!(matches!(
            send_signal(-1, Signal::Kill),
            Err(SignalError::InvalidPid(-1))
        ));
    }

    #[test]
    fn test_continue_self() {
        // SIGCONT to ourselves is harmless and must succeed
        let pid = std::process::id() as i32;
        assert!(send_signal(pid, Signal::Cont).is_ok());
    }
}
