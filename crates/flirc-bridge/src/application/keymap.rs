//! Keymap resolution: symbolic keycode → raw infrared timing string.
//!
//! Keymaps use the ir-keytable TOML format.  Only `raw` protocol blocks are
//! relevant to the bridge:
//!
//! ```toml
//! [[protocols]]
//! name = "tv"
//! protocol = "raw"
//!
//! [[protocols.raw]]
//! keycode = "KEY_POWER"
//! raw = "+9000 -4500 +560"
//! ```
//!
//! Blocks for decoded protocols (`nec`, `rc5`, ...) carry a `scancodes` table
//! instead and are skipped.
//!
//! Lookup failures are never errors from the caller's point of view: the
//! resolver answers [`Resolution::Unresolved`] with a reason, and the
//! normalizer decides what to do with it.

use serde::Deserialize;
use thiserror::Error;

/// Protocol identifier of blocks that carry raw timings.
pub const RAW_PROTOCOL: &str = "raw";

/// Answer of a keymap lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The raw timing string for the requested keycode.
    Resolved(String),
    /// The keycode could not be resolved.
    Unresolved(UnresolvedReason),
}

/// Why a keymap lookup did not produce a raw code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnresolvedReason {
    /// The keymap name is empty or would leave the keymap directory.
    #[error("invalid keymap name '{0}'")]
    InvalidName(String),

    /// No file exists for the keymap.
    #[error("keymap '{0}' not found")]
    MissingKeymap(String),

    /// The keymap file exists but could not be read.
    #[error("keymap '{keymap}' could not be read: {reason}")]
    Unreadable { keymap: String, reason: String },

    /// The keymap file is not valid TOML or does not match the schema.
    #[error("keymap '{keymap}' is malformed: {reason}")]
    Malformed { keymap: String, reason: String },

    /// The keymap has no `raw` protocol block.
    #[error("keymap '{0}' has no raw protocol block")]
    NoRawProtocol(String),

    /// No raw entry matches the keycode.
    #[error("keycode '{keycode}' not found in keymap '{keymap}'")]
    UnknownKeycode { keymap: String, keycode: String },
}

impl UnresolvedReason {
    /// `true` for failures that point at a broken installation rather than a
    /// caller asking for something that does not exist.
    pub fn is_environmental(&self) -> bool {
        matches!(
            self,
            UnresolvedReason::Unreadable { .. } | UnresolvedReason::Malformed { .. }
        )
    }
}

/// Source of keymap definitions.
///
/// The production implementation reads one file per call
/// ([`crate::infrastructure::keymap_store::FsKeymapStore`]); tests substitute
/// an in-memory table.
#[cfg_attr(test, mockall::automock)]
pub trait KeymapSource: Send + Sync {
    /// Looks up the raw timing string for `keycode` in keymap `keymap`.
    fn resolve(&self, keymap: &str, keycode: &str) -> Resolution;
}

// ── File schema ───────────────────────────────────────────────────────────────

/// Top level of an ir-keytable TOML file.
#[derive(Debug, Deserialize)]
struct KeymapFile {
    protocols: Vec<ProtocolBlock>,
}

/// One `[[protocols]]` block.
#[derive(Debug, Deserialize)]
struct ProtocolBlock {
    protocol: String,
    /// Present only on raw blocks.
    #[serde(default)]
    raw: Vec<RawEntry>,
}

/// One `[[protocols.raw]]` entry.
#[derive(Debug, Deserialize)]
struct RawEntry {
    keycode: String,
    raw: String,
}

/// Finds `keycode` in the text of keymap `keymap`.
///
/// Blocks are scanned in file order; the first raw entry with a matching
/// keycode wins.  Every `raw` block is searched, not only the first one, so a
/// keymap that splits its codes over several raw blocks still resolves.
pub fn find_raw_code(keymap: &str, contents: &str, keycode: &str) -> Resolution {
    let file: KeymapFile = match toml::from_str(contents) {
        Ok(f) => f,
        Err(e) => {
            return Resolution::Unresolved(UnresolvedReason::Malformed {
                keymap: keymap.to_string(),
                reason: e.message().to_string(),
            })
        }
    };

    let mut saw_raw_block = false;
    for block in file.protocols.iter().filter(|b| b.protocol == RAW_PROTOCOL) {
        saw_raw_block = true;
        if let Some(entry) = block.raw.iter().find(|e| e.keycode == keycode) {
            return Resolution::Resolved(entry.raw.clone());
        }
    }

    if saw_raw_block {
        Resolution::Unresolved(UnresolvedReason::UnknownKeycode {
            keymap: keymap.to_string(),
            keycode: keycode.to_string(),
        })
    } else {
        Resolution::Unresolved(UnresolvedReason::NoRawProtocol(keymap.to_string()))
    }
}

/// `true` if `name` can be used as a file stem inside the keymap directory.
pub fn is_valid_keymap_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}

// ── Tests ─────────────────────────────────────────────────────────────────────
