// ── Core error types ──
//
// Errors surfaced by the synchronization engine. Consumers never see
// HTTP status codes or MQTT client internals directly; the
// `From<pfmqtt_api::Error>` impl folds transport-layer failures into
// domain variants.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to firewall at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Firewall request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("MQTT bus unavailable: {message}")]
    BusUnavailable { message: String },

    // ── Firewall errors ──────────────────────────────────────────────
    #[error("Firewall error: {message}")]
    Firewall {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Persistence errors ───────────────────────────────────────────
    #[error("Cannot write identity file {}: {reason}", path.display())]
    Persistence { path: PathBuf, reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pfmqtt_api::Error> for CoreError {
    fn from(err: pfmqtt_api::Error) -> Self {
        match err {
            pfmqtt_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            pfmqtt_api::Error::Transport(ref e) => {
                if e.is_connect() || e.is_timeout() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Firewall {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            pfmqtt_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            pfmqtt_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            pfmqtt_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            pfmqtt_api::Error::FauxApi { message, status } => {
                CoreError::Firewall { message, status }
            }
            pfmqtt_api::Error::Mqtt { message } => CoreError::BusUnavailable { message },
            pfmqtt_api::Error::Deserialization { message, body: _ } => CoreError::Firewall {
                message: format!("Unexpected response: {message}"),
                status: None,
            },
        }
    }
}
