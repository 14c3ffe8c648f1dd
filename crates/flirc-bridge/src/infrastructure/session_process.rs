//! The interactive `flirc_util shell` child process.
//!
//! One [`SessionProcess`] exists per bridge.  It owns the child's terminal
//! behind a single `tokio::sync::Mutex`, so `run` and `restart` never
//! overlap: the lock is held from the moment a command line is written until
//! the prompt reappears, and for the whole teardown + respawn of a restart.
//!
//! # Prompt matching
//!
//! ```text
//! bridge → child:  "version\n"
//! child  → bridge: "Firmware: v4.9.3\n...flirc_util $"
//!                   └────── returned ──────┘└ marker ┘
//! ```
//!
//! The child runs on a pseudo-terminal (see [`super::pty`]); its stdin and
//! stdout are the terminal and its stderr is a separate pipe.  Terminal
//! output is read in chunks into a buffer until the ready-prompt marker
//! appears.  Everything before the marker is the command's output, with any
//! `\r\n` normalized to `\n`.
//! Bytes that arrive after the marker and before the next command cannot
//! belong to that command and are dropped when it is sent.
//!
//! # Cancellation
//!
//! `run` and `restart` execute on a spawned Tokio task.  If the caller goes
//! away (an HTTP client disconnects), the exchange with the child still runs
//! to completion, so the buffer never desynchronizes from the child's
//! prompts.
//!
//! # No timeouts
//!
//! Neither `run` nor the ready-wait of a restart is bounded.  A child that
//! never prints its prompt stalls every later command until the bridge is
//! restarted from outside.

use std::process::Stdio;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::application::session::{CommandSession, SessionError};
use crate::domain::config::SessionConfig;
use crate::domain::session_state::SessionState;
use crate::infrastructure::pty::{self, PtyMaster};

/// Line sent to ask the shell to exit before a restart.
const EXIT_LINE: &str = "exit";

/// How long an old child gets to exit on its own before it is killed.
const EXIT_GRACE: Duration = Duration::from_secs(2);

/// Size of each read from the terminal.
const READ_CHUNK: usize = 4096;

/// The single long-lived interactive session.
///
/// Cloning is cheap and every clone refers to the same child process.
#[derive(Clone)]
pub struct SessionProcess {
    inner: Arc<Inner>,
}

struct Inner {
    config: SessionConfig,
    /// `None` while dead.  Guarded by the one lock that serializes all
    /// interaction with the child.
    child: Mutex<Option<ReplChild>>,
    /// Mirror of the lifecycle state, readable without waiting for `child`.
    state: StdMutex<SessionState>,
}

impl SessionProcess {
    /// Spawns the child and waits for its first prompt.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Spawn`] if the program cannot be started, or
    /// [`SessionError::Exited`] if it exits before printing the prompt.
    pub async fn start(config: SessionConfig) -> Result<Self, SessionError> {
        let child = ReplChild::spawn(&config).await?;
        info!(
            "session '{}' ready (pid {:?})",
            config.program,
            child.child.id()
        );
        Ok(Self {
            inner: Arc::new(Inner {
                config,
                child: Mutex::new(Some(child)),
                state: StdMutex::new(SessionState::Ready),
            }),
        })
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.current_state()
    }

    /// Sends `line` and returns the output printed before the next prompt.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Unavailable`] if there is no live child.
    /// - [`SessionError::Exited`] / [`SessionError::Io`] if the child died
    ///   during this command; the session is `Dead` afterwards.
    pub async fn run(&self, line: &str) -> Result<String, SessionError> {
        let inner = Arc::clone(&self.inner);
        let line = line.to_string();
        join(tokio::spawn(async move { inner.run(&line).await })).await
    }

    /// Asks the current child to exit and starts a new one.
    ///
    /// # Errors
    ///
    /// Returns the spawn / ready-wait error of the new child; the session is
    /// `Dead` afterwards and stays so until a later restart succeeds.
    pub async fn restart(&self) -> Result<(), SessionError> {
        let inner = Arc::clone(&self.inner);
        join(tokio::spawn(async move { inner.restart().await })).await
    }

    /// Stops the child for good.  Used on bridge shutdown.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.child.lock().await;
        if let Some(child) = guard.take() {
            child.shutdown().await;
        }
        self.inner.set_state(SessionState::Dead);
    }
}

#[async_trait]
impl CommandSession for SessionProcess {
    async fn run(&self, line: &str) -> Result<String, SessionError> {
        SessionProcess::run(self, line).await
    }

    async fn restart(&self) -> Result<(), SessionError> {
        SessionProcess::restart(self).await
    }
}

/// Waits for a spawned session task, turning a panic into an I/O error.
async fn join<T>(
    handle: tokio::task::JoinHandle<Result<T, SessionError>>,
) -> Result<T, SessionError> {
    match handle.await {
        Ok(result) => result,
        Err(e) => Err(SessionError::Io(std::io::Error::other(format!(
            "session task failed: {e}"
        )))),
    }
}

impl Inner {
    fn current_state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = state;
    }

    async fn run(&self, line: &str) -> Result<String, SessionError> {
        let mut guard = self.child.lock().await;
        let child = guard.as_mut().ok_or(SessionError::Unavailable)?;

        self.set_state(SessionState::Busy);
        match child.run(line).await {
            Ok(output) => {
                self.set_state(SessionState::Ready);
                Ok(output)
            }
            Err(e) => {
                error!("session died while running '{line}': {e}");
                if let Some(dead) = guard.take() {
                    dead.kill().await;
                }
                self.set_state(SessionState::Dead);
                Err(e)
            }
        }
    }

    async fn restart(&self) -> Result<(), SessionError> {
        let mut guard = self.child.lock().await;
        self.set_state(SessionState::Starting);

        if let Some(old) = guard.take() {
            old.shutdown().await;
        }

        match ReplChild::spawn(&self.config).await {
            Ok(child) => {
                info!("session restarted (pid {:?})", child.child.id());
                *guard = Some(child);
                self.set_state(SessionState::Ready);
                Ok(())
            }
            Err(e) => {
                error!("session restart failed: {e}");
                self.set_state(SessionState::Dead);
                Err(e)
            }
        }
    }
}

// ── Child process wrapper ─────────────────────────────────────────────────────

/// A running child plus the bytes read from it but not yet consumed.
struct ReplChild {
    child: Child,
    terminal: PtyMaster,
    prompt: Vec<u8>,
    pending: Vec<u8>,
}

impl ReplChild {
    /// Spawns the configured program and consumes its banner up to the first
    /// prompt.
    async fn spawn(config: &SessionConfig) -> Result<Self, SessionError> {
        let spawn_error = |source| SessionError::Spawn {
            command: command_display(config),
            source,
        };

        let (terminal, slave) = pty::open().map_err(spawn_error)?;
        let slave_in = slave.try_clone().map_err(spawn_error)?;

        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .stdin(Stdio::from(slave_in))
            .stdout(Stdio::from(slave))
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);
        let spawned = command.spawn();
        // Closes the parent's copies of the slave so the master sees the
        // child's exit.
        drop(command);
        let mut child = spawned.map_err(spawn_error)?;

        if let Some(stderr) = child.stderr.take() {
            forward_stderr(stderr);
        }

        let mut repl = Self {
            child,
            terminal,
            prompt: config.prompt.as_bytes().to_vec(),
            pending: Vec::new(),
        };

        let banner = match repl.read_until_prompt().await {
            Ok(banner) => banner,
            Err(e) => {
                repl.kill().await;
                return Err(e);
            }
        };
        if !banner.trim().is_empty() {
            debug!("session banner: {}", banner.trim_end());
        }
        Ok(repl)
    }

    /// Writes one command line and reads its output.
    async fn run(&mut self, line: &str) -> Result<String, SessionError> {
        if !self.pending.is_empty() {
            debug!(
                "discarding {} byte(s) printed after the last prompt",
                self.pending.len()
            );
            self.pending.clear();
        }

        self.terminal
            .write_all(format!("{line}\n").as_bytes())
            .await?;

        self.read_until_prompt().await
    }

    /// Reads until the prompt marker and returns everything before it.
    async fn read_until_prompt(&mut self) -> Result<String, SessionError> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(pos) = find_marker(&self.pending, &self.prompt) {
                let output =
                    String::from_utf8_lossy(&self.pending[..pos]).replace("\r\n", "\n");
                self.pending.drain(..pos + self.prompt.len());
                return Ok(output);
            }

            let n = self.terminal.read(&mut chunk).await?;
            if n == 0 {
                return Err(SessionError::Exited);
            }
            self.pending.extend_from_slice(&chunk[..n]);
        }
    }

    /// Asks the shell to exit, closes the terminal and reaps it.
    ///
    /// A child that does not exit within [`EXIT_GRACE`] is killed.
    async fn shutdown(mut self) {
        if let Err(e) = self
            .terminal
            .write_all(format!("{EXIT_LINE}\n").as_bytes())
            .await
        {
            debug!("could not send '{EXIT_LINE}' to session: {e}");
        }
        drop(self.terminal);

        match tokio::time::timeout(EXIT_GRACE, self.child.wait()).await {
            Ok(Ok(status)) => debug!("session exited with {status}"),
            Ok(Err(e)) => warn!("failed to reap session: {e}"),
            Err(_) => {
                warn!("session ignored '{EXIT_LINE}'; killing it");
                if let Err(e) = self.child.kill().await {
                    warn!("failed to kill session: {e}");
                }
            }
        }
    }

    /// Kills the child without asking.
    async fn kill(mut self) {
        if let Err(e) = self.child.kill().await {
            debug!("failed to kill session: {e}");
        }
    }
}

/// Returns the offset of the first occurrence of `marker` in `haystack`.
fn find_marker(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() {
        return Some(0);
    }
    haystack
        .windows(marker.len())
        .position(|window| window == marker)
}

/// Logs everything the child writes to stderr.
fn forward_stderr(stderr: ChildStderr) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => warn!("[flirc_util] {line}"),
                Ok(None) => break,
                Err(e) => {
                    debug!("session stderr read error: {e}");
                    break;
                }
            }
        }
    });
}

fn command_display(config: &SessionConfig) -> String {
    std::iter::once(config.program.as_str())
        .chain(config.args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
