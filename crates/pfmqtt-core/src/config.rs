// ── Runtime bridge configuration ──
//
// These types describe *what* the bridge manages and *how* it reaches
// the firewall and the broker. They carry credential data and protocol
// tuning, but never touch disk: the binary loads a file, builds a
// `BridgeConfig` and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

/// TLS verification strategy for the firewall's web interface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. pfSense ships a self-signed certificate.
    #[default]
    DangerAcceptInvalid,
}

/// How to reach the firewall's FauxAPI endpoint.
#[derive(Debug, Clone)]
pub struct FirewallConfig {
    /// Firewall web root (e.g., `https://192.168.1.1`).
    pub url: Url,
    pub api_key: String,
    pub api_secret: SecretString,
    pub tls: TlsVerification,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// How to reach the MQTT broker.
#[derive(Debug, Clone)]
pub struct BusConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub keep_alive: Duration,
}

/// Topic prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    /// Root of the per-device topics: `<prefix>/rules/<id>/...`.
    pub prefix: String,
    /// Root of discovery topics: `<discovery_prefix>/switch/<id>/config`.
    pub discovery_prefix: String,
    /// Topic the home-automation service reports its own liveness on.
    /// `None` disables restart detection.
    pub status_topic: Option<String>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            prefix: "pfsense".into(),
            discovery_prefix: "homeassistant".into(),
            status_topic: Some("hass/status".into()),
        }
    }
}

/// Protocol delays. Defaults match what Home Assistant tolerates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timings {
    /// Wait after a broker connect before announcing.
    pub connect_settle: Duration,
    /// Pause closing each republish iteration.
    pub republish_delay: Duration,
    /// Pause between state publication and marking devices online.
    pub availability_pause: Duration,
    /// Wait after the counterpart reports online before re-announcing.
    pub restart_settle: Duration,
    /// Period of the state refresh tick. Zero disables it.
    pub refresh_interval: Duration,
    /// Flush delay before exit.
    pub shutdown_grace: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            connect_settle: Duration::from_secs(5),
            republish_delay: Duration::from_secs(30),
            availability_pause: Duration::from_secs(1),
            restart_settle: Duration::from_secs(35),
            refresh_interval: Duration::from_secs(10),
            shutdown_grace: Duration::from_secs(1),
        }
    }
}

/// Everything the synchronizer itself needs.
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    pub topics: TopicConfig,
    /// Managed rule descriptors, in announcement order.
    pub rules: Vec<String>,
    /// Full announce iterations per republish cycle (at least one runs).
    pub republish_count: u32,
    pub timings: Timings,
}

/// Complete configuration for one bridge process.
///
/// Built by the binary from the config file; core never reads files
/// other than the identity store.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub firewall: FirewallConfig,
    pub bus: BusConfig,
    /// Where descriptor → identifier pairs are kept.
    pub identity_file: PathBuf,
    pub sync: SyncConfig,
}
