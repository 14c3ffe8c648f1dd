//! Filesystem-backed keymap source.
//!
//! Every lookup reads `<dir>/<keymap>.toml` from disk, so edits made with
//! `ir-keytable` or a text editor take effect on the next command without a
//! restart.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::application::keymap::{
    find_raw_code, is_valid_keymap_name, KeymapSource, Resolution, UnresolvedReason,
};

/// Reads ir-keytable TOML keymaps from one directory.
#[derive(Debug, Clone)]
pub struct FsKeymapStore {
    dir: PathBuf,
}

impl FsKeymapStore {
    /// Creates a store rooted at `dir` (usually `/etc/rc_keymaps`).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory the store reads from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding keymap `name`.
    pub fn keymap_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.toml"))
    }
}

impl KeymapSource for FsKeymapStore {
    fn resolve(&self, keymap: &str, keycode: &str) -> Resolution {
        if !is_valid_keymap_name(keymap) {
            return Resolution::Unresolved(UnresolvedReason::InvalidName(keymap.to_string()));
        }

        let path = self.keymap_path(keymap);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Resolution::Unresolved(UnresolvedReason::MissingKeymap(
                    keymap.to_string(),
                ))
            }
            Err(e) => {
                return Resolution::Unresolved(UnresolvedReason::Unreadable {
                    keymap: keymap.to_string(),
                    reason: e.to_string(),
                })
            }
        };

        find_raw_code(keymap, &contents, keycode)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const KEYMAP: &str = r#"
[[protocols]]
name = "soundbar"
protocol = "raw"

[[protocols.raw]]
keycode = "KEY_VOLUMEUP"
raw = "+500 -200 +900"
"#;

    fn store_with(name: &str, contents: &str) -> (tempfile::TempDir, FsKeymapStore) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("{name}.toml")), contents).unwrap();
        let store = FsKeymapStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn test_resolves_from_file() {
        let (_dir, store) = store_with("soundbar", KEYMAP);
        assert_eq!(
            store.resolve("soundbar", "KEY_VOLUMEUP"),
            Resolution::Resolved("+500 -200 +900".to_string())
        );
    }

    #[test]
    fn test_missing_file_is_missing_keymap() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsKeymapStore::new(dir.path());
        assert_eq!(
            store.resolve("tv", "KEY_POWER"),
            Resolution::Unresolved(UnresolvedReason::MissingKeymap("tv".to_string()))
        );
    }

    #[test]
    fn test_directory_in_place_of_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("tv.toml")).unwrap();
        let store = FsKeymapStore::new(dir.path());

        let res = store.resolve("tv", "KEY_POWER");

        assert!(matches!(
            res,
            Resolution::Unresolved(UnresolvedReason::Unreadable { .. })
        ));
    }

    #[test]
    fn test_path_traversal_is_rejected() {
        let (_dir, store) = store_with("soundbar", KEYMAP);
        assert_eq!(
            store.resolve("../soundbar", "KEY_VOLUMEUP"),
            Resolution::Unresolved(UnresolvedReason::InvalidName("../soundbar".to_string()))
        );
    }

    #[test]
    fn test_edits_are_seen_without_reload() {
        // Arrange
        let (dir, store) = store_with("soundbar", KEYMAP);
        assert!(matches!(
            store.resolve("soundbar", "KEY_VOLUMEUP"),
            Resolution::Resolved(_)
        ));

        // Act: rewrite the file with a different code
        std::fs::write(
            dir.path().join("soundbar.toml"),
            KEYMAP.replace("+500 -200 +900", "+1 -1"),
        )
        .unwrap();

        // Assert
        assert_eq!(
            store.resolve("soundbar", "KEY_VOLUMEUP"),
            Resolution::Resolved("+1 -1".to_string())
        );
    }

    #[test]
    fn test_keymap_path_appends_toml_extension() {
        let store = FsKeymapStore::new("/etc/rc_keymaps");
        assert_eq!(
            store.keymap_path("tv"),
            PathBuf::from("/etc/rc_keymaps/tv.toml")
        );
        assert_eq!(store.dir(), Path::new("/etc/rc_keymaps"));
    }
}
