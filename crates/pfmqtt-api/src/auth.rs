// FauxAPI request signing.
//
// Every FauxAPI request carries a `fauxapi-auth` header of the form
// `<key>:<timestamp>:<nonce>:<hash>`, where the hash is the hex SHA-256
// of `secret + timestamp + nonce`. The appliance rejects timestamps that
// drift too far from its own clock.

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

/// Header name FauxAPI reads the signature from.
pub const AUTH_HEADER: &str = "fauxapi-auth";

const NONCE_LEN: usize = 8;
const TIMESTAMP_FORMAT: &str = "%Y%m%dZ%H%M%S";

/// API key pair issued by the FauxAPI package on the firewall.
#[derive(Debug, Clone)]
pub struct FauxApiCredentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

impl FauxApiCredentials {
    pub fn new(api_key: impl Into<String>, api_secret: SecretString) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret,
        }
    }

    /// Build a fresh `fauxapi-auth` header value for a request sent now.
    pub fn auth_header(&self) -> String {
        let nonce: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect();
        self.sign(Utc::now(), &nonce)
    }

    /// Build the header value for a given instant and nonce.
    pub fn sign(&self, at: DateTime<Utc>, nonce: &str) -> String {
        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();

        let mut hasher = Sha256::new();
        hasher.update(self.api_secret.expose_secret().as_bytes());
        hasher.update(timestamp.as_bytes());
        hasher.update(nonce.as_bytes());
        let hash = hex::encode(hasher.finalize());

        format!("{}:{timestamp}:{nonce}:{hash}", self.api_key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn creds() -> FauxApiCredentials {
        FauxApiCredentials::new("PFFAtest", SecretString::from("s3cret".to_string()))
    }

    #[test]
    fn sign_formats_timestamp_and_hash() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let header = creds().sign(at, "abcd1234");

        let parts: Vec<&str> = header.split(':').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], "PFFAtest");
        assert_eq!(parts[1], "20240309Z140507");
        assert_eq!(parts[2], "abcd1234");

        let expected = hex::encode(Sha256::digest(b"s3cret20240309Z140507abcd1234"));
        assert_eq!(parts[3], expected);
    }

    #[test]
    fn auth_header_uses_fresh_nonce() {
        let creds = creds();
        let a = creds.auth_header();
        let b = creds.auth_header();

        let nonce_a = a.split(':').nth(2).unwrap();
        assert_eq!(nonce_a.len(), NONCE_LEN);
        assert!(nonce_a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
