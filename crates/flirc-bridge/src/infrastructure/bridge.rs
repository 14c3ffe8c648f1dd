//! Wiring: one session, one normalizer, two ingress adapters.
//!
//! ```text
//!  HTTP (axum) ──┐
//!                ├──► CommandNormalizer ──► SessionProcess ──► flirc_util shell
//!  MQTT ─────────┘          │
//!                           └──► FsKeymapStore (/etc/rc_keymaps/<name>.toml)
//! ```
//!
//! [`Bridge`] owns the session for the lifetime of the process and hands the
//! same normalizer to both adapters.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::application::normalizer::{CommandDispatcher, CommandNormalizer};
use crate::domain::config::BridgeConfig;
use crate::domain::session_state::SessionState;
use crate::infrastructure::http_server;
use crate::infrastructure::keymap_store::FsKeymapStore;
use crate::infrastructure::mqtt_listener;
use crate::infrastructure::session_process::SessionProcess;

/// The running bridge.
pub struct Bridge {
    config: BridgeConfig,
    session: SessionProcess,
    normalizer: Arc<CommandNormalizer>,
}

impl Bridge {
    /// Starts the session and waits until it is ready.
    ///
    /// No adapter accepts traffic before this returns.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be started.
    pub async fn start(config: BridgeConfig) -> anyhow::Result<Self> {
        let session = SessionProcess::start(config.session.clone())
            .await
            .context("failed to start the flirc_util session")?;
        let keymaps = FsKeymapStore::new(config.keymap_dir.clone());
        let normalizer = Arc::new(CommandNormalizer::new(
            Arc::new(session.clone()),
            Arc::new(keymaps),
        ));

        Ok(Self {
            config,
            session,
            normalizer,
        })
    }

    /// The dispatcher shared by both adapters.
    pub fn dispatcher(&self) -> Arc<dyn CommandDispatcher> {
        self.normalizer.clone()
    }

    /// Current session state.
    pub fn session_state(&self) -> SessionState {
        self.session.state()
    }

    /// Runs both adapters until `shutdown` turns `true`, then stops the
    /// session.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP listener cannot be bound or fails.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mqtt_task = self.config.broker.clone().map(|broker| {
            tokio::spawn(mqtt_listener::run_listener(
                broker,
                self.dispatcher(),
                shutdown.clone(),
            ))
        });

        let served = http_server::serve(
            self.config.http_bind_addr,
            self.dispatcher(),
            self.config.static_root.clone(),
            shutdown,
        )
        .await;

        if let Some(task) = mqtt_task {
            if served.is_err() {
                task.abort();
            }
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("MQTT task ended abnormally: {e}");
                }
            }
        }

        info!("stopping session");
        self.session.shutdown().await;
        served
    }
}
