//! flirc-bridge: network front end for a Flirc USB infrared transceiver.
//!
//! Keeps one `flirc_util shell` session open and feeds it commands received
//! over HTTP and, optionally, MQTT.
//!
//! # Usage
//!
//! ```text
//! flirc-bridge [OPTIONS]
//!
//! Options:
//!   -b, --bind <[HOST:]PORT>       HTTP listen address [default: 8000]
//!   -m, --mqtt <URL>               mqtt[s]://[user[:pass]@]host[:port]/topic
//!   -v, --verbose...               More log output (repeatable)
//!   -q, --quiet...                 Less log output (repeatable)
//!       --session-command <CMD>    [default: "flirc_util shell"]
//!       --prompt <TEXT>            [default: "flirc_util $"]
//!       --keymap-dir <DIR>         [default: /etc/rc_keymaps]
//!       --static-root <DIR>        [default: .]
//! ```
//!
//! # Environment variable overrides
//!
//! CLI args take precedence when both are present.
//!
//! | Variable                        | Option              |
//! |---------------------------------|---------------------|
//! | `FLIRC_BRIDGE_BIND`             | `--bind`            |
//! | `FLIRC_BRIDGE_MQTT`             | `--mqtt`            |
//! | `FLIRC_BRIDGE_SESSION_COMMAND`  | `--session-command` |
//! | `FLIRC_BRIDGE_PROMPT`           | `--prompt`          |
//! | `FLIRC_BRIDGE_KEYMAP_DIR`       | `--keymap-dir`      |
//! | `FLIRC_BRIDGE_STATIC_ROOT`      | `--static-root`     |
//!
//! `RUST_LOG`, when set, replaces the level chosen by `-v`/`-q`.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;

use anyhow::{anyhow, Context};
use clap::{ArgAction, Parser};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use flirc_bridge::domain::config::{
    DEFAULT_HTTP_PORT, DEFAULT_KEYMAP_DIR, DEFAULT_PROMPT, DEFAULT_SESSION_COMMAND,
};
use flirc_bridge::domain::{BridgeConfig, BrokerUrl, SessionConfig};
use flirc_bridge::infrastructure::Bridge;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Flirc infrared bridge.
///
/// Exposes a `flirc_util shell` session over HTTP and MQTT.
#[derive(Debug, Parser)]
#[command(
    name = "flirc-bridge",
    about = "HTTP and MQTT bridge for a Flirc infrared transceiver",
    version
)]
struct Cli {
    /// HTTP listen address as `[host:]port`.
    ///
    /// An empty or missing host listens on all interfaces.
    #[arg(short, long, default_value_t = DEFAULT_HTTP_PORT.to_string(), env = "FLIRC_BRIDGE_BIND")]
    bind: String,

    /// MQTT broker and topic, e.g. `mqtt://user:pw@broker.local/ir/send`.
    ///
    /// Without this option only the HTTP adapter runs.
    #[arg(short, long, env = "FLIRC_BRIDGE_MQTT")]
    mqtt: Option<String>,

    /// Increase log verbosity (info, debug, trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity (error, off).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "verbose")]
    quiet: u8,

    /// Command line of the interactive session.
    #[arg(long, default_value = DEFAULT_SESSION_COMMAND, env = "FLIRC_BRIDGE_SESSION_COMMAND")]
    session_command: String,

    /// Text the session prints when it is ready for the next command.
    #[arg(long, default_value = DEFAULT_PROMPT, env = "FLIRC_BRIDGE_PROMPT")]
    prompt: String,

    /// Directory holding ir-keytable `<name>.toml` keymaps.
    #[arg(long, default_value = DEFAULT_KEYMAP_DIR, env = "FLIRC_BRIDGE_KEYMAP_DIR")]
    keymap_dir: PathBuf,

    /// Document root for static files served on GET.
    #[arg(long, default_value = ".", env = "FLIRC_BRIDGE_STATIC_ROOT")]
    static_root: PathBuf,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`BridgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns an error if `--bind` or `--mqtt` cannot be parsed, or if
    /// `--session-command` is empty.
    fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let http_bind_addr = parse_bind(&self.bind)?;

        let broker = self
            .mqtt
            .as_deref()
            .map(BrokerUrl::parse)
            .transpose()
            .context("invalid --mqtt URL")?;

        let session = SessionConfig::from_command_line(&self.session_command, &self.prompt)
            .ok_or_else(|| anyhow!("--session-command must name a program"))?;

        Ok(BridgeConfig {
            http_bind_addr,
            broker,
            session,
            keymap_dir: self.keymap_dir,
            static_root: self.static_root,
        })
    }

    /// Log filter directive for the `-v`/`-q` counts.
    fn log_level(&self) -> &'static str {
        match (self.verbose, self.quiet) {
            (0, 0) => "warn",
            (1, _) => "info",
            (2, _) => "debug",
            (v, _) if v >= 3 => "trace",
            (_, 1) => "error",
            _ => "off",
        }
    }
}

/// Parses `[host:]port`.
///
/// IPv6 hosts may be bracketed (`[::1]:8000`).  An empty host means all
/// interfaces.
fn parse_bind(bind: &str) -> anyhow::Result<SocketAddr> {
    let (host, port) = match bind.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => ("", bind),
    };
    let port: u16 = port
        .parse()
        .with_context(|| format!("invalid port in bind address '{bind}'"))?;

    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Ok(SocketAddr::from(([0, 0, 0, 0], port)));
    }

    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve bind host '{host}'"))?
        .next()
        .ok_or_else(|| anyhow!("bind host '{host}' has no addresses"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and logging is initialised.
/// 2. The session is started; neither adapter listens before it is ready.
/// 3. A Ctrl+C handler is spawned that flips the shutdown channel.
/// 4. [`Bridge::run`] serves HTTP (and MQTT, if configured) until shutdown,
///    then stops the session.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level())),
        )
        .init();

    let config = cli.into_bridge_config()?;

    info!(
        "flirc-bridge starting: http={}, mqtt={}, session={:?}",
        config.http_bind_addr,
        config
            .broker
            .as_ref()
            .map_or_else(|| "disabled".to_string(), |b| format!("{}:{}", b.host, b.port)),
        config.session.program
    );

    let bridge = Bridge::start(config).await?;
    info!("session is {}", bridge.session_state());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    bridge.run(shutdown_rx).await?;

    info!("flirc-bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
