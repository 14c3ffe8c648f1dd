//! flirc-bridge library crate.
//!
//! Exposes one interactive `flirc_util shell` session over HTTP and MQTT.
//!
//! # Architecture
//!
//! ```text
//! HTTP POST /<command>?k=v      MQTT {"keymap": .., "keycode": ..}
//!         ↕                                 ↓
//! [flirc-bridge]
//!   ├── domain/           Command, CommandOutcome, SessionState, config
//!   ├── application/      CommandNormalizer, keymap parsing, session trait
//!   └── infrastructure/
//!         ├── session_process/  the locked child process
//!         ├── pty/              the child's pseudo-terminal
//!         ├── keymap_store/     /etc/rc_keymaps/<name>.toml
//!         ├── http_server/      axum request adapter
//!         └── mqtt_listener/    rumqttc event adapter
//! ```
//!
//! # Layer rules
//!
//! - `domain` performs no I/O.
//! - `application` depends on `domain` and reaches the outside world only
//!   through the `CommandSession` and `KeymapSource` traits.
//! - `infrastructure` implements those traits and owns all sockets, files
//!   and processes.

/// Domain layer: pure types (no I/O).
pub mod domain;

/// Application layer: command normalization.
pub mod application;

/// Infrastructure layer: child process, keymap files, HTTP and MQTT.
pub mod infrastructure;
