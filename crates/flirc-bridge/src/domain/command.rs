//! Command types and the pure text transformations applied to them.
//!
//! A [`Command`] is what both ingress adapters produce: a command name plus an
//! ordered list of `(key, value)` flags.  The normalizer turns it into one of
//! three [`CommandOutcome`]s after (optionally) running a command line against
//! the `flirc_util` session.
//!
//! # Command line format
//!
//! The session accepts GNU-style long options, one token per flag:
//!
//! ```text
//! sendir --csv=500,200,900
//! settings --name=living\ room
//! ```
//!
//! Only spaces and tabs inside values are escaped.  Every other character is
//! passed through verbatim, so callers of the bridge are trusted.
//!
//! # Raw → CSV
//!
//! ir-keytable keymaps store raw codes as signed durations (`+500 -200 +900`,
//! `+` = pulse, `-` = space).  `flirc_util sendir` wants bare comma-separated
//! durations (`500,200,900`); [`raw_to_csv`] performs that conversion.

/// Name of the derived command that sends an infrared code by keymap name.
///
/// `ir-ctl-send?keymap=tv&keycode=KEY_POWER` is rewritten into a
/// [`SEND_COMMAND`] pass-through command when the code can be resolved.
pub const DERIVED_SEND_COMMAND: &str = "ir-ctl-send";

/// Pass-through command that transmits a raw infrared code.
pub const SEND_COMMAND: &str = "sendir";

/// Command that tears down the `flirc_util` session and starts a new one.
pub const RESTART_COMMAND: &str = "restart";

/// Commands forwarded verbatim to the `flirc_util` shell.
pub const PASS_THROUGH_COMMANDS: &[&str] = &["settings", SEND_COMMAND, "version"];

/// Flag naming the keymap file for [`DERIVED_SEND_COMMAND`].
pub const KEYMAP_FLAG: &str = "keymap";

/// Flag naming the keycode inside the keymap for [`DERIVED_SEND_COMMAND`].
pub const KEYCODE_FLAG: &str = "keycode";

/// Flag carrying the comma-separated durations for [`SEND_COMMAND`].
pub const CSV_FLAG: &str = "csv";

/// One request to the bridge, as decoded by an ingress adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Command name (`version`, `sendir`, `ir-ctl-send`, `restart`, ...).
    pub name: String,
    /// Flags in the order the caller supplied them.  Keys may repeat.
    pub flags: Vec<(String, String)>,
}

impl Command {
    /// Creates a command from a name and an ordered flag list.
    pub fn new(name: impl Into<String>, flags: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            flags,
        }
    }

    /// Returns the value of the *last* flag named `key`, if any.
    ///
    /// Later occurrences override earlier ones, the same way collecting the
    /// flag list into a map would.
    pub fn flag(&self, key: &str) -> Option<&str> {
        self.flags
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// `true` if the name is one of [`PASS_THROUGH_COMMANDS`].
    pub fn is_pass_through(&self) -> bool {
        PASS_THROUGH_COMMANDS.contains(&self.name.as_str())
    }

    /// Builds the line written to the session for a pass-through command.
    ///
    /// The result is the command name followed by one `--key=value` token per
    /// flag, in order, with values passed through [`shell_escape`].
    pub fn to_command_line(&self) -> String {
        let mut line = self.name.clone();
        for (key, value) in &self.flags {
            line.push_str(" --");
            line.push_str(key);
            line.push('=');
            line.push_str(&shell_escape(value));
        }
        line
    }
}

/// The three ways a command can end.
///
/// Ingress adapters translate these into their own vocabulary: HTTP uses
/// 200 / 204 / 404, MQTT only logs them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// The session ran the command and produced this output.
    Text(String),
    /// The command was acknowledged without output (restart).
    Empty,
    /// The command name is not known to the bridge.
    Unrecognized,
}

/// Escapes the characters the `flirc_util` shell splits tokens on.
///
/// Spaces become `\ ` and tabs become `\` followed by a literal tab.  Nothing
/// else is touched.
pub fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            ' ' | '\t' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Converts a raw ir-keytable code into the CSV form `sendir` expects.
///
/// Every space becomes a comma and every `+` / `-` is dropped:
/// `"+500 -200 +900"` → `"500,200,900"`.
pub fn raw_to_csv(raw: &str) -> String {
    raw.chars()
        .filter(|c| *c != '+' && *c != '-')
        .map(|c| if c == ' ' { ',' } else { c })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_raw_to_csv_strips_signs_and_joins_with_commas() {
        assert_eq!(raw_to_csv("+500 -200 +900"), "500,200,900");
    }

    #[test]
    fn test_raw_to_csv_keeps_unsigned_tokens() {
        assert_eq!(raw_to_csv("9000 4500 +560"), "9000,4500,560");
    }

    #[test]
    fn test_raw_to_csv_translates_every_space() {
        // Double spaces are not collapsed; each one becomes a comma.
        assert_eq!(raw_to_csv("+1  -2"), "1,,2");
    }

    #[test]
    fn test_raw_to_csv_empty_input() {
        assert_eq!(raw_to_csv(""), "");
    }

    #[test]
    fn test_shell_escape_escapes_spaces_and_tabs_only() {
        assert_eq!(shell_escape("a b\tc"), "a\\ b\\\tc");
    }

    #[test]
    fn test_shell_escape_leaves_other_characters_alone() {
        // Quotes, semicolons and backslashes are not escaped.
        assert_eq!(shell_escape("x;'y'\\z"), "x;'y'\\z");
    }

    #[test]
    fn test_command_line_without_flags_is_just_the_name() {
        let cmd = Command::new("version", vec![]);
        assert_eq!(cmd.to_command_line(), "version");
    }

    #[test]
    fn test_command_line_keeps_flag_order() {
        // Arrange
        let cmd = Command::new("settings", flags(&[("b", "2"), ("a", "1")]));

        // Act
        let line = cmd.to_command_line();

        // Assert
        assert_eq!(line, "settings --b=2 --a=1");
    }

    #[test]
    fn test_command_line_preserves_duplicate_keys() {
        let cmd = Command::new("settings", flags(&[("x", "1"), ("x", "2")]));
        assert_eq!(cmd.to_command_line(), "settings --x=1 --x=2");
    }

    #[test]
    fn test_command_line_escapes_values() {
        let cmd = Command::new("settings", flags(&[("name", "living room")]));
        assert_eq!(cmd.to_command_line(), "settings --name=living\\ room");
    }

    #[test]
    fn test_flag_returns_last_occurrence() {
        let cmd = Command::new("ir-ctl-send", flags(&[("keymap", "a"), ("keymap", "b")]));
        assert_eq!(cmd.flag("keymap"), Some("b"));
    }

    #[test]
    fn test_flag_missing_returns_none() {
        let cmd = Command::new("ir-ctl-send", flags(&[("keymap", "a")]));
        assert_eq!(cmd.flag("keycode"), None);
    }

    #[test]
    fn test_pass_through_set() {
        for name in ["settings", "sendir", "version"] {
            assert!(Command::new(name, vec![]).is_pass_through(), "{name}");
        }
        for name in ["restart", "ir-ctl-send", "exit", ""] {
            assert!(!Command::new(name, vec![]).is_pass_through(), "{name}");
        }
    }
}
