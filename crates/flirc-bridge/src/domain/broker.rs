//! MQTT broker address, parsed from a single URL.
//!
//! ```text
//! mqtt(s)://[username[:password]@]host[:port]/topic
//! ```
//!
//! `mqtt://` defaults to port 1883 and plain TCP; `mqtts://` defaults to port
//! 8883 and TLS.  The URL path (without its leading `/`) is the topic the
//! bridge subscribes to.

use thiserror::Error;
use url::Url;

use crate::domain::percent::percent_decode;

/// Default port for plain MQTT.
pub const MQTT_PORT: u16 = 1883;

/// Default port for MQTT over TLS.
pub const MQTTS_PORT: u16 = 8883;

/// Errors produced while parsing a broker URL.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BrokerUrlError {
    /// The string is not a URL at all.
    #[error("invalid broker URL: {0}")]
    Invalid(String),

    /// The scheme is neither `mqtt` nor `mqtts`.
    #[error("unsupported broker URL scheme '{0}' (expected mqtt or mqtts)")]
    UnsupportedScheme(String),

    /// The URL has no host component.
    #[error("broker URL has no host")]
    MissingHost,
}

/// A parsed broker URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerUrl {
    /// Broker hostname or IP address.
    pub host: String,
    /// Broker port (explicit or scheme default).
    pub port: u16,
    /// `true` for `mqtts://`.
    pub tls: bool,
    /// Optional username (percent-decoded).
    pub username: Option<String>,
    /// Optional password (percent-decoded).
    pub password: Option<String>,
    /// Topic to subscribe to.  May be empty if the URL has no path.
    pub topic: String,
}

impl BrokerUrl {
    /// Parses `mqtt(s)://[username[:password]@]host[:port]/topic`.
    ///
    /// # Errors
    ///
    /// See [`BrokerUrlError`].
    pub fn parse(input: &str) -> Result<Self, BrokerUrlError> {
        let url = Url::parse(input).map_err(|e| BrokerUrlError::Invalid(e.to_string()))?;

        let tls = match url.scheme() {
            "mqtt" => false,
            "mqtts" => true,
            other => return Err(BrokerUrlError::UnsupportedScheme(other.to_string())),
        };

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(BrokerUrlError::MissingHost)?
            .to_string();

        let port = url
            .port()
            .unwrap_or(if tls { MQTTS_PORT } else { MQTT_PORT });

        let username = Some(percent_decode(url.username())).filter(|u| !u.is_empty());
        let password = url.password().map(percent_decode);

        let topic = percent_decode(url.path().strip_prefix('/').unwrap_or(url.path()));

        Ok(Self {
            host,
            port,
            tls,
            username,
            password,
            topic,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
