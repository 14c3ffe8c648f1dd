//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! `main.rs` builds it from CLI arguments and environment variables; tests
//! build it directly or start from [`BridgeConfig::default`].
//!
//! Keeping configuration as a plain struct (no global state, no environment
//! reads inside the domain) lets the bridge be embedded in tests with a fake
//! session command and a temporary keymap directory.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::domain::broker::BrokerUrl;

/// Program started for the interactive session.
pub const DEFAULT_SESSION_COMMAND: &str = "flirc_util shell";

/// Prompt printed by `flirc_util shell` when it is ready for input.
pub const DEFAULT_PROMPT: &str = "flirc_util $";

/// Directory holding ir-keytable keymaps (`<name>.toml`).
pub const DEFAULT_KEYMAP_DIR: &str = "/etc/rc_keymaps";

/// Default HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 8000;

/// How to launch the interactive child process and recognise its prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Executable to run.
    pub program: String,
    /// Arguments passed to `program`.
    pub args: Vec<String>,
    /// Ready-prompt marker.  The session is idle once this string appears on
    /// its standard output.
    pub prompt: String,
}

impl SessionConfig {
    /// Builds a config from a whitespace-separated command line.
    ///
    /// Returns `None` if `command_line` contains no program name.
    ///
    /// ```rust
    /// use flirc_bridge::domain::SessionConfig;
    ///
    /// let cfg = SessionConfig::from_command_line("flirc_util shell", "flirc_util $").unwrap();
    /// assert_eq!(cfg.program, "flirc_util");
    /// assert_eq!(cfg.args, vec!["shell".to_string()]);
    /// ```
    pub fn from_command_line(command_line: &str, prompt: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            prompt: prompt.to_string(),
        })
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            program: "flirc_util".to_string(),
            args: vec!["shell".to_string()],
            prompt: DEFAULT_PROMPT.to_string(),
        }
    }
}

/// All runtime configuration for the bridge.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Address the HTTP request adapter listens on.
    pub http_bind_addr: SocketAddr,

    /// Broker to subscribe to.  `None` disables the MQTT event adapter.
    pub broker: Option<BrokerUrl>,

    /// Child process settings.
    pub session: SessionConfig,

    /// Directory searched for `<keymap>.toml` files.
    pub keymap_dir: PathBuf,

    /// Document root for the static-file fallback of the HTTP adapter.
    pub static_root: PathBuf,
}

impl Default for BridgeConfig {
    /// | Field          | Default             |
    /// |----------------|---------------------|
    /// | http_bind_addr | `0.0.0.0:8000`      |
    /// | broker         | none                |
    /// | session        | `flirc_util shell`  |
    /// | keymap_dir     | `/etc/rc_keymaps`   |
    /// | static_root    | `.`                 |
    fn default() -> Self {
        Self {
            http_bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
            broker: None,
            session: SessionConfig::default(),
            keymap_dir: PathBuf::from(DEFAULT_KEYMAP_DIR),
            static_root: PathBuf::from("."),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_http_port_is_8000() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.http_bind_addr.port(), 8000);
        assert!(cfg.http_bind_addr.ip().is_unspecified());
    }

    #[test]
    fn test_default_has_no_broker() {
        assert!(BridgeConfig::default().broker.is_none());
    }

    #[test]
    fn test_default_session_runs_flirc_util_shell() {
        let cfg = BridgeConfig::default();
        assert_eq!(cfg.session.program, "flirc_util");
        assert_eq!(cfg.session.args, vec!["shell"]);
        assert_eq!(cfg.session.prompt, "flirc_util $");
    }

    #[test]
    fn test_default_keymap_dir() {
        assert_eq!(
            BridgeConfig::default().keymap_dir,
            PathBuf::from("/etc/rc_keymaps")
        );
    }

    #[test]
    fn test_session_from_command_line_splits_on_whitespace() {
        let cfg = SessionConfig::from_command_line("  sudo  flirc_util\tshell ", "$ ").unwrap();
        assert_eq!(cfg.program, "sudo");
        assert_eq!(cfg.args, vec!["flirc_util", "shell"]);
        assert_eq!(cfg.prompt, "$ ");
    }

    #[test]
    fn test_session_from_empty_command_line_is_none() {
        assert!(SessionConfig::from_command_line("   ", "$").is_none());
    }

    #[test]
    fn test_default_session_matches_default_command_line() {
        let parsed = SessionConfig::from_command_line(DEFAULT_SESSION_COMMAND, DEFAULT_PROMPT);
        assert_eq!(parsed, Some(SessionConfig::default()));
    }
}
