//! The seam between the normalizer and the interactive child process.

use async_trait::async_trait;
use thiserror::Error;

/// Failures of the interactive session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The child process could not be spawned.
    #[error("failed to spawn session command '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading from or writing to the child failed.
    #[error("session I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The child closed its output before printing the ready prompt.
    #[error("session exited before printing its prompt")]
    Exited,

    /// There is no usable session: a previous restart failed or the child
    /// died.  Only a successful restart clears this.
    #[error("session unavailable")]
    Unavailable,
}

/// A line-oriented interactive session that runs one command at a time.
///
/// Implementations serialize `run` and `restart` against each other: at most
/// one call touches the child at any moment.
#[async_trait]
pub trait CommandSession: Send + Sync {
    /// Sends `line` and returns the output printed before the next prompt.
    async fn run(&self, line: &str) -> Result<String, SessionError>;

    /// Replaces the child process with a freshly started one.
    async fn restart(&self) -> Result<(), SessionError>;
}
