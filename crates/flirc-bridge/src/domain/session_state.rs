//! Lifecycle states of the `flirc_util` session.
//!
//! ```text
//!              start / restart
//!   ┌──────────┐  ready marker  ┌───────┐   run()   ┌──────┐
//!   │ Starting │ ─────────────► │ Ready │ ────────► │ Busy │
//!   └──────────┘                └───────┘ ◄──────── └──────┘
//!        │  spawn failed /          ▲       prompt seen  │ child exited
//!        │  no ready marker         │ restart            ▼
//!        └──────────────────────► ┌──────┐ ◄─────────────┘
//!                                 │ Dead │
//!                                 └──────┘
//! ```
//!
//! `restart` may be issued from any state.  Only `Ready` accepts `run`.

use std::fmt;

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// A child process has been spawned and the bridge is waiting for the
    /// first ready prompt.
    Starting,
    /// The child is idle at its prompt.
    Ready,
    /// A command line has been written and the bridge is reading its output.
    Busy,
    /// No usable child.  Only a restart can leave this state.
    Dead,
}

impl SessionState {
    /// `true` if a command can be sent right now (after acquiring the lock).
    pub fn accepts_commands(self) -> bool {
        self == SessionState::Ready
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Starting => "starting",
            SessionState::Ready => "ready",
            SessionState::Busy => "busy",
            SessionState::Dead => "dead",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_ready_accepts_commands() {
        assert!(SessionState::Ready.accepts_commands());
        assert!(!SessionState::Starting.accepts_commands());
        assert!(!SessionState::Busy.accepts_commands());
        assert!(!SessionState::Dead.accepts_commands());
    }

    #[test]
    fn test_display_is_lowercase() {
        assert_eq!(SessionState::Dead.to_string(), "dead");
        assert_eq!(SessionState::Busy.to_string(), "busy");
    }
}
