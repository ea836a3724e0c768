//! MQTT connection with auto-reconnect.
//!
//! Drives a `rumqttc` event loop in a background task and surfaces the
//! connection lifecycle as a small [`BusEvent`] stream: connects,
//! reconnect attempts, transport errors, and inbound messages. On a
//! transport error the loop backs off exponentially (with jitter) before
//! polling again, which makes `rumqttc` redial the broker.
//!
//! # Example
//!
//! ```rust,ignore
//! use pfmqtt_api::mqtt::{MqttBus, MqttSettings, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let (bus, mut events) = MqttBus::connect(&settings, ReconnectConfig::default(), cancel.clone());
//!
//! while let Some(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Error;

pub use rumqttc::QoS;

// ── Channel capacities ───────────────────────────────────────────────

const REQUEST_CHANNEL_CAPACITY: usize = 256;
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── BusEvent ─────────────────────────────────────────────────────────

/// Connection lifecycle and inbound traffic from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The broker acknowledged a (re)connect.
    Connected,
    /// The event loop is about to redial after a failure.
    Reconnecting,
    /// The connection failed or dropped.
    Error(String),
    /// A message arrived on a subscribed topic.
    Message { topic: String, payload: Vec<u8> },
}

// ── Settings ─────────────────────────────────────────────────────────

/// Broker connection parameters.
#[derive(Debug, Clone)]
pub struct MqttSettings {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub keep_alive: Duration,
}

impl MqttSettings {
    /// Translate into `rumqttc` options.
    pub fn to_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some(ref username) = self.username {
            let password = self
                .password
                .as_ref()
                .map(|p| p.expose_secret().to_owned())
                .unwrap_or_default();
            options.set_credentials(username, password);
        }
        options
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for broker reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

// ── MqttBus ──────────────────────────────────────────────────────────

/// Handle for publishing and subscribing on a running connection.
///
/// Cheaply cloneable; every clone feeds the same event loop.
#[derive(Clone)]
pub struct MqttBus {
    client: AsyncClient,
}

impl MqttBus {
    /// Create the client and spawn the event loop task.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background and is reported as [`BusEvent::Connected`] or
    /// [`BusEvent::Error`] on the returned receiver.
    pub fn connect(
        settings: &MqttSettings,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> (Self, mpsc::Receiver<BusEvent>) {
        let (client, eventloop) = AsyncClient::new(settings.to_options(), REQUEST_CHANNEL_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tracing::info!(host = %settings.host, port = settings.port, "connecting to MQTT broker");
        tokio::spawn(event_loop(eventloop, event_tx, reconnect, cancel));

        (Self { client }, event_rx)
    }

    pub async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), Error> {
        tracing::trace!(topic, ?qos, "publish");
        self.client.publish(topic, qos, false, payload).await?;
        Ok(())
    }

    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), Error> {
        tracing::debug!(topic, "subscribe");
        self.client.subscribe(topic, qos).await?;
        Ok(())
    }

    /// Send a DISCONNECT to the broker.
    pub async fn disconnect(&self) -> Result<(), Error> {
        self.client.disconnect().await?;
        Ok(())
    }
}

// ── Background event loop ────────────────────────────────────────────

/// Main loop: poll → translate → on error, backoff → poll again.
async fn event_loop(
    mut eventloop: EventLoop,
    event_tx: mpsc::Sender<BusEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let polled = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            polled = eventloop.poll() => polled,
        };

        let event = match polled {
            Ok(event) => {
                if matches!(event, Event::Incoming(Packet::ConnAck(_))) {
                    attempt = 0;
                }
                translate(event)
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "MQTT connection error");
                if event_tx.send(BusEvent::Error(e.to_string())).await.is_err() {
                    break;
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::debug!(delay_ms = delay.as_millis(), attempt, "waiting before reconnect");

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
                Some(BusEvent::Reconnecting)
            }
        };

        if let Some(event) = event {
            if event_tx.send(event).await.is_err() {
                tracing::debug!("bus event receiver dropped");
                break;
            }
        }
    }

    tracing::debug!("MQTT event loop exiting");
}

/// Map a raw `rumqttc` event to the events the bridge cares about.
fn translate(event: Event) -> Option<BusEvent> {
    match event {
        Event::Incoming(Packet::ConnAck(_)) => Some(BusEvent::Connected),
        Event::Incoming(Packet::Publish(publish)) => Some(BusEvent::Message {
            topic: publish.topic,
            payload: publish.payload.to_vec(),
        }),
        other => {
            tracing::trace!(?other, "MQTT event");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(16)).unwrap_or(16);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    Duration::from_secs_f64((capped * jitter_factor).max(0.0))
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rumqttc::{ConnAck, ConnectReturnCode, Publish};

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };

        for attempt in [10, 100, u32::MAX] {
            let delay = calculate_backoff(attempt, &config);
            assert!(
                delay <= Duration::from_millis(12_500),
                "delay at attempt {attempt} ({delay:?}) should be capped near max_delay"
            );
        }
    }

    #[test]
    fn connack_translates_to_connected() {
        let event = Event::Incoming(Packet::ConnAck(ConnAck::new(
            ConnectReturnCode::Success,
            false,
        )));
        assert_eq!(translate(event), Some(BusEvent::Connected));
    }

    #[test]
    fn publish_translates_to_message() {
        let publish = Publish::new("pfsense/rules/abc/command", QoS::AtMostOnce, "ON");
        let event = Event::Incoming(Packet::Publish(publish));
        assert_eq!(
            translate(event),
            Some(BusEvent::Message {
                topic: "pfsense/rules/abc/command".into(),
                payload: b"ON".to_vec(),
            })
        );
    }

    #[test]
    fn other_packets_are_dropped() {
        assert_eq!(translate(Event::Incoming(Packet::PingResp)), None);
    }

    #[test]
    fn settings_translate_to_options() {
        let settings = MqttSettings {
            host: "broker.lan".into(),
            port: 1884,
            client_id: "pfsense-mqtt".into(),
            username: Some("bridge".into()),
            password: Some(SecretString::from("pw".to_string())),
            keep_alive: Duration::from_secs(30),
        };
        let options = settings.to_options();
        assert_eq!(options.broker_address(), ("broker.lan".to_string(), 1884));
        assert_eq!(options.client_id(), "pfsense-mqtt");
        assert_eq!(options.keep_alive(), Duration::from_secs(30));
    }
}
