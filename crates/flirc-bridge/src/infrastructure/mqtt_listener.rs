//! MQTT event adapter.
//!
//! Subscribes to one topic and turns every message into an `ir-ctl-send`
//! command.  The payload is a JSON object whose entries become the command's
//! flags:
//!
//! ```json
//! {"keymap": "tv", "keycode": "KEY_POWER"}
//! ```
//!
//! This adapter can only transmit infrared codes; it never issues
//! pass-through commands or restarts.  Malformed payloads and failed
//! commands are logged and dropped.
//!
//! # Connection lifecycle
//!
//! `rumqttc` reconnects on the next `poll()` after a connection error.  The
//! subscription is (re)issued on every ConnAck, so it survives reconnects
//! and broker restarts.
//!
//! # Ordering
//!
//! ```text
//! eventloop.poll() ──Publish──► bounded queue ──► one worker ──► dispatcher
//! ```
//!
//! Payloads are queued in arrival order and executed one after another by a
//! single worker, so the event loop keeps polling (and answering keep-alives)
//! while a slow command runs.  When the queue is full new messages are
//! dropped with a warning.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::application::normalizer::CommandDispatcher;
use crate::domain::broker::BrokerUrl;
use crate::domain::command::{Command, CommandOutcome, DERIVED_SEND_COMMAND};

/// MQTT keep-alive interval.
const KEEP_ALIVE: Duration = Duration::from_secs(60);

/// Capacity of the request channel between the client handle and the loop.
const REQUEST_CAPACITY: usize = 10;

/// Messages waiting for the worker before new ones are dropped.
const MESSAGE_QUEUE_CAPACITY: usize = 64;

/// First delay after a connection error; doubles up to [`MAX_RETRY_DELAY`].
const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Longest delay between reconnect attempts.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(120);

/// Reasons a message payload cannot become a command.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The payload is not valid JSON (or not UTF-8).
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The payload is valid JSON but not an object.
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Decodes a message payload into an `ir-ctl-send` command.
///
/// String values are used verbatim; any other JSON value is rendered as JSON
/// text (`5`, `true`, `null`).
///
/// # Errors
///
/// See [`PayloadError`].
pub fn decode_payload(payload: &[u8]) -> Result<Command, PayloadError> {
    let value: Value = serde_json::from_slice(payload)?;
    let map = match value {
        Value::Object(map) => map,
        other => return Err(PayloadError::NotAnObject(json_kind(&other))),
    };

    let flags = map
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect();

    Ok(Command::new(DERIVED_SEND_COMMAND, flags))
}

/// Decodes and executes one message, logging the result.
pub async fn handle_message(dispatcher: &dyn CommandDispatcher, payload: &[u8]) {
    let command = match decode_payload(payload) {
        Ok(c) => c,
        Err(e) => {
            warn!("dropping MQTT message: {e}");
            return;
        }
    };

    let flags = command.flags.clone();
    match dispatcher.dispatch(command).await {
        Ok(CommandOutcome::Unrecognized) => {
            info!("{flags:?}: code could not be resolved; message dropped");
        }
        Ok(outcome) => info!("{flags:?}: {outcome:?}"),
        Err(e) => error!("{flags:?}: {e}"),
    }
}

/// Builds client options for `broker`.
pub fn mqtt_options(broker: &BrokerUrl, client_id: &str) -> MqttOptions {
    let mut options = MqttOptions::new(client_id, broker.host.clone(), broker.port);
    options.set_keep_alive(KEEP_ALIVE);
    if let Some(username) = &broker.username {
        options.set_credentials(
            username.clone(),
            broker.password.clone().unwrap_or_default(),
        );
    }
    if broker.tls {
        options.set_transport(Transport::tls_with_default_config());
    }
    options
}

/// Client id used for this process.
pub fn client_id() -> String {
    format!("flirc-bridge-{}", std::process::id())
}

/// Executes queued payloads in order until every sender is gone.
pub async fn process_messages(
    mut queue: mpsc::Receiver<Vec<u8>>,
    dispatcher: Arc<dyn CommandDispatcher>,
) {
    while let Some(payload) = queue.recv().await {
        handle_message(dispatcher.as_ref(), &payload).await;
    }
}

/// Drives the subscription until `shutdown` turns `true`.
///
/// Messages still queued at shutdown are executed before this returns.
pub async fn run_listener(
    broker: BrokerUrl,
    dispatcher: Arc<dyn CommandDispatcher>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let client_id = client_id();
    info!(
        "connecting to MQTT broker {}:{} as {client_id}",
        broker.host, broker.port
    );
    let (client, mut eventloop) =
        AsyncClient::new(mqtt_options(&broker, &client_id), REQUEST_CAPACITY);
    let (queue, pending) = mpsc::channel(MESSAGE_QUEUE_CAPACITY);
    let worker = tokio::spawn(process_messages(pending, dispatcher));

    let mut retry_delay = MIN_RETRY_DELAY;
    loop {
        tokio::select! {
            _ = stop_requested(&mut shutdown) => break,
            event = eventloop.poll() => match event {
                Ok(event) => {
                    retry_delay = MIN_RETRY_DELAY;
                    on_event(event, &client, &broker.topic, &queue);
                }
                Err(e) => {
                    warn!("MQTT connection error: {e}; retrying in {retry_delay:?}");
                    if sleep_or_shutdown(retry_delay, &mut shutdown).await {
                        break;
                    }
                    retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                }
            },
        }
    }

    info!("MQTT adapter stopping");
    if let Err(e) = client.try_disconnect() {
        debug!("MQTT disconnect: {e}");
    }
    drain_disconnect(&mut eventloop).await;

    drop(queue);
    if let Err(e) = worker.await {
        error!("MQTT worker ended abnormally: {e}");
    }
}

/// Reacts to one event-loop event.
///
/// Publishes are queued for the worker; this never waits on the session.
pub fn on_event(
    event: Event,
    client: &AsyncClient,
    topic: &str,
    queue: &mpsc::Sender<Vec<u8>>,
) {
    match event {
        Event::Incoming(Packet::ConnAck(ack)) => {
            info!("connected to MQTT broker ({:?})", ack.code);
            info!("subscribing to {topic:?}");
            if let Err(e) = client.try_subscribe(topic, QoS::AtMostOnce) {
                error!("failed to subscribe to {topic:?}: {e}");
            }
        }
        Event::Incoming(Packet::Publish(publish)) => {
            debug!(
                "message on {:?} ({} bytes)",
                publish.topic,
                publish.payload.len()
            );
            match queue.try_send(publish.payload.to_vec()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!("MQTT message queue full; dropping message");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    error!("MQTT worker is gone; dropping message");
                }
            }
        }
        other => debug!("MQTT event: {other:?}"),
    }
}

/// Sleeps for `delay`; returns `true` if shutdown was requested meanwhile.
async fn sleep_or_shutdown(
    delay: Duration,
    shutdown: &mut tokio::sync::watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = stop_requested(shutdown) => true,
    }
}

/// Resolves once `shutdown` turns `true` (or its sender is gone).
async fn stop_requested(shutdown: &mut tokio::sync::watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|&stop| stop).await;
}

/// Polls briefly so the queued DISCONNECT reaches the broker.
async fn drain_disconnect(eventloop: &mut EventLoop) {
    let _ = tokio::time::timeout(Duration::from_millis(500), async {
        while let Ok(event) = eventloop.poll().await {
            if matches!(event, Event::Outgoing(rumqttc::Outgoing::Disconnect)) {
                break;
            }
        }
    })
    .await;
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::SessionError;
    use async_trait::async_trait;
    use rumqttc::Publish;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDispatcher {
        commands: Mutex<Vec<Command>>,
    }

    #[async_trait]
    impl CommandDispatcher for RecordingDispatcher {
        async fn dispatch(&self, command: Command) -> Result<CommandOutcome, SessionError> {
            tokio::task::yield_now().await;
            self.commands.lock().unwrap().push(command);
            Ok(CommandOutcome::Unrecognized)
        }
    }

    fn offline_client() -> (AsyncClient, EventLoop) {
        AsyncClient::new(MqttOptions::new("test", "localhost", 1883), REQUEST_CAPACITY)
    }

    fn publish(payload: String) -> Event {
        Event::Incoming(Packet::Publish(Publish::new(
            "ir/send",
            QoS::AtMostOnce,
            payload,
        )))
    }

    fn send_payload(keycode: &str) -> String {
        format!(r#"{{"keymap": "tv", "keycode": "{keycode}"}}"#)
    }

    #[test]
    fn test_decode_object_into_ir_ctl_send() {
        let cmd = decode_payload(br#"{"keymap": "k1", "keycode": "c1"}"#).unwrap();
        assert_eq!(cmd.name, "ir-ctl-send");
        assert_eq!(
            cmd.flags,
            vec![
                ("keymap".to_string(), "k1".to_string()),
                ("keycode".to_string(), "c1".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_keeps_document_order() {
        let cmd = decode_payload(br#"{"keycode": "c1", "keymap": "k1"}"#).unwrap();
        assert_eq!(cmd.flags[0].0, "keycode");
        assert_eq!(cmd.flags[1].0, "keymap");
    }

    #[test]
    fn test_decode_renders_non_string_values_as_json() {
        let cmd = decode_payload(br#"{"repeat": 3, "hold": true, "x": null}"#).unwrap();
        assert_eq!(
            cmd.flags,
            vec![
                ("repeat".to_string(), "3".to_string()),
                ("hold".to_string(), "true".to_string()),
                ("x".to_string(), "null".to_string()),
            ]
        );
    }

    #[test]
    fn test_decode_rejects_non_object() {
        let err = decode_payload(b"[1, 2]").unwrap_err();
        assert!(matches!(err, PayloadError::NotAnObject("an array")));
    }

    #[test]
    fn test_decode_rejects_invalid_json() {
        assert!(matches!(
            decode_payload(b"{not json"),
            Err(PayloadError::Json(_))
        ));
        assert!(matches!(
            decode_payload(&[0xff, 0xfe]),
            Err(PayloadError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_handle_message_dispatches_decoded_command() {
        let dispatcher = RecordingDispatcher::default();

        handle_message(&dispatcher, br#"{"keymap": "tv", "keycode": "KEY_POWER"}"#).await;

        let commands = dispatcher.commands.lock().unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].name, "ir-ctl-send");
        assert_eq!(commands[0].flag("keycode"), Some("KEY_POWER"));
    }

    #[tokio::test]
    async fn test_handle_message_drops_bad_payload() {
        let dispatcher = RecordingDispatcher::default();

        handle_message(&dispatcher, b"\"just a string\"").await;

        assert!(dispatcher.commands.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_publishes_are_dispatched_in_arrival_order() {
        // Arrange
        let recorder = Arc::new(RecordingDispatcher::default());
        let dispatcher: Arc<dyn CommandDispatcher> = recorder.clone();
        let (client, _eventloop) = offline_client();
        let (queue, pending) = mpsc::channel(MESSAGE_QUEUE_CAPACITY);
        let worker = tokio::spawn(process_messages(pending, dispatcher));

        // Act
        for i in 0..MESSAGE_QUEUE_CAPACITY {
            on_event(
                publish(send_payload(&format!("KEY_{i}"))),
                &client,
                "ir/send",
                &queue,
            );
        }
        drop(queue);
        worker.await.unwrap();

        // Assert
        let keycodes: Vec<String> = recorder
            .commands
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.flag("keycode").unwrap().to_string())
            .collect();
        let expected: Vec<String> = (0..MESSAGE_QUEUE_CAPACITY)
            .map(|i| format!("KEY_{i}"))
            .collect();
        assert_eq!(keycodes, expected);
    }

    #[tokio::test]
    async fn test_full_queue_drops_new_messages() {
        let (client, _eventloop) = offline_client();
        let (queue, mut pending) = mpsc::channel(1);

        on_event(publish(send_payload("KEY_A")), &client, "ir/send", &queue);
        on_event(publish(send_payload("KEY_B")), &client, "ir/send", &queue);

        let queued = pending.try_recv().unwrap();
        assert_eq!(queued, send_payload("KEY_A").into_bytes());
        assert!(pending.try_recv().is_err());
    }

    #[test]
    fn test_options_for_plain_broker() {
        let broker = BrokerUrl::parse("mqtt://user:pw@broker.local/ir").unwrap();
        let options = mqtt_options(&broker, "flirc-bridge-1");
        assert_eq!(
            options.broker_address(),
            ("broker.local".to_string(), 1883)
        );
        assert_eq!(options.keep_alive(), KEEP_ALIVE);
        assert_eq!(options.client_id(), "flirc-bridge-1");
        assert_eq!(
            options.credentials(),
            Some(("user".to_string(), "pw".to_string()))
        );
    }

    #[test]
    fn test_options_without_credentials() {
        let broker = BrokerUrl::parse("mqtts://broker.local/ir").unwrap();
        let options = mqtt_options(&broker, "id");
        assert_eq!(options.credentials(), None);
        assert_eq!(options.broker_address().1, 8883);
    }

    #[test]
    fn test_client_id_contains_pid() {
        assert_eq!(
            client_id(),
            format!("flirc-bridge-{}", std::process::id())
        );
    }
}
