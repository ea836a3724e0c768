use thiserror::Error;

/// Top-level error type for the `pfmqtt-api` crate.
///
/// Covers every failure mode across both external surfaces:
/// FauxAPI authentication, HTTP transport, the FauxAPI response envelope,
/// and the MQTT client. `pfmqtt-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// FauxAPI rejected the request signature (wrong key/secret, clock skew).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── FauxAPI ─────────────────────────────────────────────────────
    /// Error reported by FauxAPI (non-2xx status or `message != "ok"`).
    #[error("FauxAPI error: {message}")]
    FauxApi { message: String, status: Option<u16> },

    // ── MQTT ────────────────────────────────────────────────────────
    /// The MQTT client could not queue a request (event loop gone).
    #[error("MQTT client error: {message}")]
    Mqtt { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl From<rumqttc::ClientError> for Error {
    fn from(err: rumqttc::ClientError) -> Self {
        Self::Mqtt {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_limit() {
        let err = Error::Timeout { timeout_secs: 30 };
        assert_eq!(err.to_string(), "Request timed out after 30s");
    }
}
