//! Application layer for flirc-bridge.
//!
//! The application layer knows *what* to do with a command but delegates
//! *how* to talk to the child process and the filesystem to the
//! infrastructure layer, through the [`CommandSession`] and [`KeymapSource`]
//! traits.
//!
//! # Responsibilities
//!
//! - Classifying commands and building session command lines
//! - Rewriting `ir-ctl-send` into `sendir` through keymap resolution
//! - Parsing keymap files
//!
//! # What does NOT belong here?
//!
//! - Spawning processes, binding sockets, reading files
//! - HTTP or MQTT encoding (that is the ingress adapters' job)

pub mod keymap;
pub mod normalizer;
pub mod session;

pub use keymap::{KeymapSource, Resolution, UnresolvedReason};
pub use normalizer::{CommandDispatcher, CommandNormalizer, SendFallback};
pub use session::{CommandSession, SessionError};
