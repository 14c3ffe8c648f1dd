//! CommandNormalizer: turns an ingress [`Command`] into a [`CommandOutcome`].
//!
//! Both ingress adapters hand their decoded commands to the same normalizer,
//! which knows nothing about HTTP or MQTT.  It classifies the command name:
//!
//! ```text
//! ir-ctl-send ──(keymap + keycode resolve)──► sendir --csv=...
//!      │                                            │
//!      └──(any lookup failure: fall through)──┐     │
//!                                             ▼     ▼
//! settings | sendir | version ──────────► session.run(line)  → Text(output)
//! restart ──────────────────────────────► session.restart()  → Empty
//! anything else ─────────────────────────────────────────────→ Unrecognized
//! ```
//!
//! The normalizer takes no lock itself; the session serializes `run` and
//! `restart`.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::application::keymap::{KeymapSource, Resolution, UnresolvedReason};
use crate::application::session::{CommandSession, SessionError};
use crate::domain::command::{
    raw_to_csv, Command, CommandOutcome, CSV_FLAG, DERIVED_SEND_COMMAND, KEYCODE_FLAG,
    KEYMAP_FLAG, RESTART_COMMAND, SEND_COMMAND,
};

/// Why an `ir-ctl-send` command was not rewritten into `sendir`.
///
/// Any of these makes the normalizer fall back to treating the command under
/// its original name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendFallback {
    /// A required flag is absent.
    #[error("missing '{0}' flag")]
    MissingFlag(&'static str),

    /// The keymap lookup failed.
    #[error(transparent)]
    Unresolved(#[from] UnresolvedReason),

    /// The keymap entry exists but its raw code is empty.
    #[error("raw code for '{0}' is empty")]
    EmptyRawCode(String),
}

/// Something that executes commands on behalf of an ingress adapter.
///
/// Adapters depend on this trait rather than on [`CommandNormalizer`] so they
/// can be tested with a recording double.
#[async_trait]
pub trait CommandDispatcher: Send + Sync {
    /// Executes `command` and reports how it ended.
    ///
    /// # Errors
    ///
    /// Returns the session's error if the child process could not run the
    /// command or be restarted.
    async fn dispatch(&self, command: Command) -> Result<CommandOutcome, SessionError>;
}

/// Classifies commands and drives the session.
pub struct CommandNormalizer {
    session: Arc<dyn CommandSession>,
    keymaps: Arc<dyn KeymapSource>,
}

impl CommandNormalizer {
    /// Creates a normalizer over one shared session and keymap source.
    pub fn new(session: Arc<dyn CommandSession>, keymaps: Arc<dyn KeymapSource>) -> Self {
        Self { session, keymaps }
    }

    /// Rewrites an `ir-ctl-send` command into `sendir --csv=<timings>`.
    ///
    /// # Errors
    ///
    /// Returns the reason the rewrite is not possible; the caller falls back
    /// to the original command.
    pub fn rewrite_derived_send(&self, command: &Command) -> Result<Command, SendFallback> {
        let keymap = command
            .flag(KEYMAP_FLAG)
            .ok_or(SendFallback::MissingFlag(KEYMAP_FLAG))?;
        let keycode = command
            .flag(KEYCODE_FLAG)
            .ok_or(SendFallback::MissingFlag(KEYCODE_FLAG))?;

        let raw = match self.keymaps.resolve(keymap, keycode) {
            Resolution::Resolved(raw) => raw,
            Resolution::Unresolved(reason) => return Err(reason.into()),
        };
        if raw.is_empty() {
            return Err(SendFallback::EmptyRawCode(keycode.to_string()));
        }

        Ok(Command::new(
            SEND_COMMAND,
            vec![(CSV_FLAG.to_string(), raw_to_csv(&raw))],
        ))
    }

    /// Executes one command.
    ///
    /// # Errors
    ///
    /// Propagates [`SessionError`] from `run` / `restart`.
    pub async fn normalize(&self, command: Command) -> Result<CommandOutcome, SessionError> {
        let command = if command.name == DERIVED_SEND_COMMAND {
            match self.rewrite_derived_send(&command) {
                Ok(rewritten) => rewritten,
                Err(SendFallback::Unresolved(reason)) if reason.is_environmental() => {
                    warn!("{DERIVED_SEND_COMMAND}: {reason}; falling back to original command");
                    command
                }
                Err(reason) => {
                    debug!("{DERIVED_SEND_COMMAND}: {reason}; falling back to original command");
                    command
                }
            }
        } else {
            command
        };

        if command.is_pass_through() {
            let line = command.to_command_line();
            debug!("session <- {line}");
            let output = self.session.run(&line).await?;
            return Ok(CommandOutcome::Text(output));
        }

        if command.name == RESTART_COMMAND {
            info!("restarting session");
            self.session.restart().await?;
            return Ok(CommandOutcome::Empty);
        }

        debug!("unrecognized command '{}'", command.name);
        Ok(CommandOutcome::Unrecognized)
    }
}

#[async_trait]
impl CommandDispatcher for CommandNormalizer {
    async fn dispatch(&self, command: Command) -> Result<CommandOutcome, SessionError> {
        self.normalize(command).await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
