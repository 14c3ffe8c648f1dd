//! Domain layer for flirc-bridge.
//!
//! Pure types and text transformations with no I/O: the [`Command`] both
//! adapters produce, the [`CommandOutcome`] they translate back, the session
//! lifecycle states, the broker URL and the runtime configuration.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, child-process, socket or HTTP types
//! - File I/O or environment variable reading
//! - Anything that could block or fail due to external state

pub mod broker;
pub mod command;
pub mod config;
pub mod percent;
pub mod session_state;

pub use broker::{BrokerUrl, BrokerUrlError};
pub use command::{Command, CommandOutcome};
pub use config::{BridgeConfig, SessionConfig};
pub use session_state::SessionState;
