// pfmqtt-api: Async clients for the pfSense FauxAPI and the MQTT broker.

pub mod auth;
pub mod error;
pub mod fauxapi;
pub mod mqtt;
pub mod transport;

pub use auth::FauxApiCredentials;
pub use error::Error;
pub use fauxapi::{ConfigPatch, FauxApiClient, FilterConfig, FilterRule, SystemConfig};
pub use mqtt::{BusEvent, MqttBus, MqttSettings, QoS, ReconnectConfig};
pub use transport::{TlsMode, TransportConfig};
