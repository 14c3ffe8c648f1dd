//! Infrastructure layer for flirc-bridge.
//!
//! Everything that touches the outside world: the `flirc_util` child
//! process, keymap files, the HTTP listener and the MQTT broker.
//!
//! # What does NOT belong here?
//!
//! - Command classification (that is the application layer)
//! - Command and outcome types (that is the domain layer)
//! - CLI parsing (that is done in `main.rs`)

pub mod bridge;
pub mod http_server;
pub mod keymap_store;
pub mod mqtt_listener;
pub mod pty;
pub mod session_process;

pub use bridge::Bridge;
pub use keymap_store::FsKeymapStore;
pub use session_process::SessionProcess;
