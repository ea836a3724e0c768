//! Configuration for the pfSense MQTT bridge.
//!
//! TOML file, `PFMQTT_` environment overrides, the flat environment
//! variable names older deployments use, secret resolution, and
//! translation to `pfmqtt_core::BridgeConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use pfmqtt_core::{
    BridgeConfig, BusConfig, FirewallConfig, SyncConfig, Timings, TlsVerification, TopicConfig,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no {service} credentials configured")]
    NoCredentials { service: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub mqtt: MqttSection,
    pub pfsense: PfSenseSection,
    pub topics: TopicsSection,
    pub state: StateSection,
    pub bridge: BridgeSection,
    pub timing: TimingSection,
}

const DEFAULT_MQTT_PORT: u16 = 1883;

/// `[mqtt]`: broker connection.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct MqttSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(deserialize_with = "port_or_default")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub username: Option<String>,

    /// Password (plaintext; prefer `password_env`).
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub password: Option<String>,

    /// Environment variable name containing the password.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    pub client_id: String,

    /// Keep-alive interval in seconds.
    pub keep_alive: u64,
}

impl Default for MqttSection {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_MQTT_PORT,
            username: None,
            password: None,
            password_env: None,
            client_id: "pfsense-mqtt".into(),
            keep_alive: 30,
        }
    }
}

/// `[pfsense]`: FauxAPI endpoint and credentials.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct PfSenseSection {
    /// Firewall address, with or without scheme (e.g., "192.168.1.1").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub api_key: Option<String>,

    /// API secret (plaintext; prefer `api_secret_env`).
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "lenient_string")]
    pub api_secret: Option<String>,

    /// Environment variable name containing the API secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_secret_env: Option<String>,

    /// Accept the firewall's self-signed certificate.
    pub insecure: bool,

    /// Path to a custom CA certificate. Takes precedence over `insecure`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    /// Request timeout in seconds.
    pub timeout: u64,
}

impl Default for PfSenseSection {
    fn default() -> Self {
        Self {
            host: None,
            api_key: None,
            api_secret: None,
            api_secret_env: None,
            insecure: true,
            ca_cert: None,
            timeout: 30,
        }
    }
}

/// `[topics]`: topic prefixes and the managed rules.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TopicsSection {
    pub prefix: String,
    pub discovery_prefix: String,
    /// Home Assistant birth topic. Empty means the default.
    pub status_topic: String,
    /// Rule descriptions to expose, in announcement order.
    pub rules: Vec<String>,
}

impl Default for TopicsSection {
    fn default() -> Self {
        let topics = TopicConfig::default();
        Self {
            prefix: topics.prefix,
            discovery_prefix: topics.discovery_prefix,
            status_topic: topics.status_topic.unwrap_or_default(),
            rules: Vec::new(),
        }
    }
}

/// `[state]`: on-disk state.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct StateSection {
    pub identity_file: PathBuf,
}

impl Default for StateSection {
    fn default() -> Self {
        Self {
            identity_file: PathBuf::from("uuids.json"),
        }
    }
}

/// `[bridge]`: republish behaviour.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct BridgeSection {
    /// Full announce iterations per republish cycle.
    pub republish_count: u32,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self { republish_count: 1 }
    }
}

/// `[timing]`: protocol delays in seconds.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct TimingSection {
    pub connect_settle: u64,
    pub republish_delay: u64,
    pub availability_pause: u64,
    pub restart_settle: u64,
    pub refresh_interval: u64,
    pub shutdown_grace: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        let t = Timings::default();
        Self {
            connect_settle: t.connect_settle.as_secs(),
            republish_delay: t.republish_delay.as_secs(),
            availability_pause: t.availability_pause.as_secs(),
            restart_settle: t.restart_settle.as_secs(),
            refresh_interval: t.refresh_interval.as_secs(),
            shutdown_grace: t.shutdown_grace.as_secs(),
        }
    }
}

impl From<&TimingSection> for Timings {
    fn from(t: &TimingSection) -> Self {
        Self {
            connect_settle: Duration::from_secs(t.connect_settle),
            republish_delay: Duration::from_secs(t.republish_delay),
            availability_pause: Duration::from_secs(t.availability_pause),
            restart_settle: Duration::from_secs(t.restart_settle),
            refresh_interval: Duration::from_secs(t.refresh_interval),
            shutdown_grace: Duration::from_secs(t.shutdown_grace),
        }
    }
}

/// Accept numbers and booleans where a string is expected. Environment
/// values like `MQTTPASSWORD=1234` arrive as integers.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        UInt(u64),
        Float(f64),
        Bool(bool),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
        Raw::UInt(n) => n.to_string(),
        Raw::Float(n) => n.to_string(),
        Raw::Bool(b) => b.to_string(),
    }))
}

/// Accept the port as a number or a numeric string. An empty value, as
/// container environments pass for unset variables, means the default.
fn port_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u16),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(port) => Ok(port),
        Raw::Str(s) if s.trim().is_empty() => Ok(DEFAULT_MQTT_PORT),
        Raw::Str(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port '{s}'"))),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Platform config file location (XDG on Linux).
pub fn config_path() -> PathBuf {
    ProjectDirs::from("io", "pfmqtt", "pfmqtt").map_or_else(
        || PathBuf::from("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Pick the config file: an explicit path, else `PFMQTT_CONFIG`, else
/// `./config.toml` when present, else the platform location.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("PFMQTT_CONFIG") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    let local = PathBuf::from("config.toml");
    if local.is_file() {
        return local;
    }
    config_path()
}

// ── Config loading ──────────────────────────────────────────────────

/// Flat variable names understood for compatibility with older
/// container deployments, and the key each one sets.
const LEGACY_ENV: &[(&str, &str)] = &[
    ("MQTTHOST", "mqtt.host"),
    ("MQTTPORT", "mqtt.port"),
    ("MQTTUSER", "mqtt.username"),
    ("MQTTPASSWORD", "mqtt.password"),
    ("MQTTPFSENSETOPIC", "topics.prefix"),
    ("PFSENSEHOST", "pfsense.host"),
    ("PFSENSEAPIKEY", "pfsense.api_key"),
    ("PFSENSEAPISECRET", "pfsense.api_secret"),
    ("HASSDISCOVERYPREFIX", "topics.discovery_prefix"),
    ("HASSTOPIC", "topics.status_topic"),
];

/// JSON array of rule descriptions.
const LEGACY_RULES_ENV: &str = "PFSENSERULES";

fn legacy_env() -> Env {
    let keys: Vec<&str> = LEGACY_ENV.iter().map(|(env, _)| *env).collect();
    Env::raw().only(&keys).map(|key| {
        LEGACY_ENV
            .iter()
            .find(|(env, _)| key.as_str().eq_ignore_ascii_case(env))
            .map_or_else(|| key.into(), |(_, path)| (*path).into())
    })
}

/// Build the layered provider: defaults, file, `PFMQTT_*`, legacy names.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PFMQTT_").split("__"))
        .merge(legacy_env())
}

/// Load the full Config from `path` plus the environment.
///
/// A missing file is not an error; the environment alone may configure
/// everything.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let mut figment = figment(path);

    if let Ok(raw) = std::env::var(LEGACY_RULES_ENV) {
        let rules: Vec<String> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::Validation {
                field: LEGACY_RULES_ENV.into(),
                reason: format!("expected a JSON array of strings: {e}"),
            })?;
        figment = figment.merge(Serialized::default("topics.rules", rules));
    }

    let config: Config = figment.extract()?;
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve a secret: the named environment variable first, then the
/// plaintext value from the file.
pub fn resolve_secret(
    plaintext: Option<&str>,
    env_name: Option<&str>,
) -> Option<SecretString> {
    if let Some(env_name) = env_name {
        if let Ok(val) = std::env::var(env_name) {
            return Some(SecretString::from(val));
        }
    }
    plaintext.map(|s| SecretString::from(s.to_owned()))
}

/// Turn a bare host into a URL, defaulting to HTTPS.
fn firewall_url(host: &str) -> Result<url::Url, ConfigError> {
    let raw = if host.contains("://") {
        host.to_owned()
    } else {
        format!("https://{host}")
    };
    raw.parse().map_err(|e| ConfigError::Validation {
        field: "pfsense.host".into(),
        reason: format!("invalid URL '{host}': {e}"),
    })
}

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Validation {
            field: field.into(),
            reason: "required".into(),
        })
}

/// Build the firewall connection settings.
pub fn firewall_config(cfg: &PfSenseSection) -> Result<FirewallConfig, ConfigError> {
    let url = firewall_url(required(cfg.host.as_deref(), "pfsense.host")?)?;

    let no_creds = || ConfigError::NoCredentials {
        service: "pfSense FauxAPI".into(),
    };
    let api_key = cfg
        .api_key
        .clone()
        .filter(|k| !k.is_empty())
        .ok_or_else(no_creds)?;
    let api_secret = resolve_secret(cfg.api_secret.as_deref(), cfg.api_secret_env.as_deref())
        .ok_or_else(no_creds)?;

    let tls = if let Some(ref ca_path) = cfg.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else if cfg.insecure {
        TlsVerification::DangerAcceptInvalid
    } else {
        TlsVerification::SystemDefaults
    };

    Ok(FirewallConfig {
        url,
        api_key,
        api_secret,
        tls,
        timeout: Duration::from_secs(cfg.timeout),
    })
}

/// Build the broker connection settings.
pub fn bus_config(cfg: &MqttSection) -> Result<BusConfig, ConfigError> {
    let host = required(cfg.host.as_deref(), "mqtt.host")?.to_owned();
    if cfg.client_id.is_empty() {
        return Err(ConfigError::Validation {
            field: "mqtt.client_id".into(),
            reason: "must not be empty".into(),
        });
    }

    Ok(BusConfig {
        host,
        port: cfg.port,
        client_id: cfg.client_id.clone(),
        username: cfg.username.clone().filter(|u| !u.is_empty()),
        password: resolve_secret(cfg.password.as_deref(), cfg.password_env.as_deref()),
        keep_alive: Duration::from_secs(cfg.keep_alive),
    })
}

/// Build the synchronizer settings. Needs no credentials.
///
/// Blank topic settings fall back to their defaults.
pub fn sync_config(cfg: &Config) -> Result<SyncConfig, ConfigError> {
    let topics = &cfg.topics;
    let defaults = TopicConfig::default();

    let prefix = topic_prefix("topics.prefix", &topics.prefix, defaults.prefix)?;
    let discovery_prefix = topic_prefix(
        "topics.discovery_prefix",
        &topics.discovery_prefix,
        defaults.discovery_prefix,
    )?;
    let status_topic = match topics.status_topic.trim() {
        "" => defaults.status_topic,
        topic => Some(topic.to_owned()),
    };

    Ok(SyncConfig {
        topics: TopicConfig {
            prefix,
            discovery_prefix,
            status_topic,
        },
        rules: topics.rules.clone(),
        republish_count: cfg.bridge.republish_count,
        timings: Timings::from(&cfg.timing),
    })
}

fn topic_prefix(field: &str, value: &str, default: String) -> Result<String, ConfigError> {
    let value = value.trim().trim_end_matches('/');
    if value.is_empty() {
        return Ok(default);
    }
    if value.contains(['+', '#']) {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: format!("'{value}' is not a valid topic prefix"),
        });
    }
    Ok(value.to_owned())
}

/// Build the complete `BridgeConfig`.
pub fn to_bridge_config(cfg: &Config) -> Result<BridgeConfig, ConfigError> {
    Ok(BridgeConfig {
        firewall: firewall_config(&cfg.pfsense)?,
        bus: bus_config(&cfg.mqtt)?,
        identity_file: cfg.state.identity_file.clone(),
        sync: sync_config(cfg)?,
    })
}
