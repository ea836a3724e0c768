//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use pfmqtt_config::ConfigError;
use pfmqtt_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const CONFIG: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the firewall at {url}")]
    #[diagnostic(
        code(pfmqtt::connection_failed),
        help(
            "Check that pfSense is reachable and the FauxAPI package is installed.\n\
             A self-signed certificate needs `insecure = true` or `ca_cert` under [pfsense]."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Firewall request timed out after {seconds}s")]
    #[diagnostic(
        code(pfmqtt::timeout),
        help("Increase `timeout` under [pfsense] or check the firewall's load.")
    )]
    Timeout { seconds: u64 },

    #[error("MQTT connection closed unexpectedly")]
    #[diagnostic(
        code(pfmqtt::bus_closed),
        help("The MQTT event loop stopped. Check the broker address and credentials.")
    )]
    BusClosed,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(pfmqtt::auth_failed),
        help(
            "Verify the FauxAPI key and secret in /etc/fauxapi/credentials.ini on the firewall.\n\
             The request signature embeds a timestamp, so the clocks must agree."
        )
    )]
    AuthFailed { message: String },

    #[error("No {service} credentials configured")]
    #[diagnostic(
        code(pfmqtt::no_credentials),
        help(
            "Set `api_key` and `api_secret` (or `api_secret_env`) under [pfsense],\n\
             or export PFSENSEAPIKEY and PFSENSEAPISECRET."
        )
    )]
    NoCredentials { service: String },

    // ── Firewall ─────────────────────────────────────────────────────
    #[error("Firewall rejected the request: {message}")]
    #[diagnostic(code(pfmqtt::firewall))]
    Firewall { message: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pfmqtt::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration incomplete and no file found")]
    #[diagnostic(
        code(pfmqtt::no_config),
        help(
            "Create a config file or set the environment variables.\n\
             Expected at: {path}\n\
             Missing: {field}"
        )
    )]
    NoConfig { path: String, field: String },

    #[error("Could not load configuration: {message}")]
    #[diagnostic(code(pfmqtt::config))]
    ConfigLoad { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Cannot encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    #[diagnostic(code(pfmqtt::internal))]
    Internal { message: String },
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } | Self::BusClosed => {
                exit_code::CONNECTION
            }
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::ConfigLoad { .. } => {
                exit_code::CONFIG
            }
            _ => exit_code::GENERAL,
        }
    }

    /// Translate a configuration error, pointing at the expected file when
    /// it does not exist.
    pub fn from_config(err: ConfigError, path: &std::path::Path) -> Self {
        match err {
            ConfigError::Validation { field, reason: _ } if !path.exists() => Self::NoConfig {
                path: path.display().to_string(),
                field,
            },
            other => other.into(),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoCredentials { service } => Self::NoCredentials { service },
            ConfigError::Figment(e) => Self::ConfigLoad {
                message: e.to_string(),
            },
            ConfigError::Io(e) => Self::Io(e),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => Self::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message } => Self::AuthFailed { message },
            CoreError::Timeout { timeout_secs } => Self::Timeout {
                seconds: timeout_secs,
            },
            CoreError::BusUnavailable { message: _ } => Self::BusClosed,
            CoreError::Firewall { message, status } => Self::Firewall {
                message: match status {
                    Some(code) => format!("{message} (HTTP {code})"),
                    None => message,
                },
            },
            CoreError::Config { message } => Self::Validation {
                field: "configuration".into(),
                reason: message,
            },
            CoreError::Persistence { path, reason } => Self::Internal {
                message: format!("identity file {}: {reason}", path.display()),
            },
            CoreError::Internal(message) => Self::Internal { message },
        }
    }
}
