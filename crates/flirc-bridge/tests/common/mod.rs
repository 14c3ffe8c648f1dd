//! Shared fixtures: a `sh` script that behaves like `flirc_util shell`.

#![allow(dead_code)]

use flirc_bridge::domain::SessionConfig;

/// Prompt printed by [`FAKE_SHELL`].
pub const FAKE_PROMPT: &str = "fake $ ";

/// Minimal interactive shell.
///
/// - `version` prints `v1.2.3`
/// - `pid` prints the shell's process id
/// - `echo <text>` prints `<text>`
/// - `sendir ...` prints `sent ...`
/// - `last` prints the previous command line
/// - `crash` exits with status 3 without a prompt
/// - `exit` exits cleanly
pub const FAKE_SHELL: &str = r#"
printf 'fake banner\nfake $ '
last=''
while IFS= read -r line; do
  case "$line" in
    version) printf 'v1.2.3\n' ;;
    pid) printf '%s\n' "$$" ;;
    echo\ *) printf '%s\n' "${line#echo }" ;;
    sendir*) printf 'sent %s\n' "${line#sendir }" ;;
    last) printf '%s\n' "$last" ;;
    crash) exit 3 ;;
    exit) exit 0 ;;
    *) printf 'unknown command: %s\n' "$line" ;;
  esac
  if [ "$line" != last ]; then last="$line"; fi
  printf 'fake $ '
done
"#;

/// Session config running [`FAKE_SHELL`].
pub fn fake_session() -> SessionConfig {
    SessionConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), FAKE_SHELL.to_string()],
        prompt: FAKE_PROMPT.to_string(),
    }
}

/// Session config running an arbitrary script under `sh -c`.
pub fn script_session(script: &str) -> SessionConfig {
    SessionConfig {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
        prompt: FAKE_PROMPT.to_string(),
    }
}

/// An ir-keytable keymap with one raw block and one decoded block.
pub const TV_KEYMAP: &str = r#"
[[protocols]]
name = "tv-nec"
protocol = "nec"
[protocols.scancodes]
0x04 = "KEY_POWER"

[[protocols]]
name = "tv"
protocol = "raw"

[[protocols.raw]]
keycode = "KEY_POWER"
raw = "+9000 -4500 +560"

[[protocols.raw]]
keycode = "KEY_MUTE"
raw = "+9000 -2250 +560"
"#;
