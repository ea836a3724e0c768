// pfmqtt-core: Rule/state synchronization between pfSense and MQTT.

pub mod config;
pub mod error;
pub mod gateway;
pub mod model;
pub mod registry;
pub mod republish;
pub mod rules;
pub mod synchronizer;
pub mod topics;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{BridgeConfig, BusConfig, FirewallConfig, SyncConfig, Timings, TlsVerification, TopicConfig};
pub use error::CoreError;
pub use gateway::{BusGateway, Delivery, FirewallGateway, build_firewall_client, bus_settings};
pub use model::{Availability, DeviceId, SwitchDiscovery, SwitchState};
pub use registry::IdentityRegistry;
pub use rules::{RuleReport, status_report};
pub use synchronizer::{ShutdownKind, Synchronizer};
pub use topics::DeviceTopics;

// Wire types consumers need alongside the synchronizer.
pub use pfmqtt_api::{BusEvent, FilterRule};
