// FauxAPI HTTP client
//
// Wraps `reqwest::Client` with request signing and envelope unwrapping
// for the two actions the bridge needs: `config_get` and `config_patch`.
// Both operate on the whole configuration document.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use super::models::{ConfigGetData, ConfigPatch, FauxApiResponse, SystemConfig};
use crate::auth::{AUTH_HEADER, FauxApiCredentials};
use crate::error::Error;
use crate::transport::TransportConfig;

const API_PATH: &str = "fauxapi/v1/";

/// Raw HTTP client for the pfSense FauxAPI package.
///
/// Every request is signed with a fresh `fauxapi-auth` header. All methods
/// return the unwrapped `data` payload; the `{ callid, action, message }`
/// envelope is checked and stripped before the caller sees it.
pub struct FauxApiClient {
    http: reqwest::Client,
    base_url: Url,
    credentials: FauxApiCredentials,
    /// Request timeout the HTTP client was built with, when known.
    timeout: Option<Duration>,
}

impl FauxApiClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the firewall web root, e.g. `https://192.168.1.1`.
    pub fn new(
        base_url: Url,
        credentials: FauxApiCredentials,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            timeout: Some(transport.timeout),
            ..Self::with_client(http, base_url, credentials)
        })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        credentials: FauxApiCredentials,
    ) -> Self {
        Self {
            http,
            base_url,
            credentials,
            timeout: None,
        }
    }

    /// The firewall base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Actions ──────────────────────────────────────────────────────

    /// Fetch the full system configuration (`config_get`).
    pub async fn get_configuration(&self) -> Result<SystemConfig, Error> {
        let url = self.action_url("config_get")?;
        let data: ConfigGetData = self.get(url).await?;
        debug!(rules = data.config.filter.rule.len(), "fetched configuration");
        Ok(data.config)
    }

    /// Merge a partial configuration into the running one (`config_patch`).
    pub async fn patch_configuration(&self, patch: &ConfigPatch) -> Result<(), Error> {
        let url = self.action_url("config_patch")?;
        let data: Option<serde_json::Value> = self.post(url, patch).await?;
        let backup = data
            .as_ref()
            .and_then(|d| d.get("previous_config_file"))
            .and_then(serde_json::Value::as_str);
        debug!(backup, "configuration patched");
        Ok(())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/fauxapi/v1/?action={action}`.
    pub(crate) fn action_url(&self, action: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{API_PATH}"))?;
        url.query_pairs_mut().append_pair("action", action);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// A timed-out request reports the configured limit.
    fn send_error(&self, err: reqwest::Error) -> Error {
        match self.timeout {
            Some(limit) if err.is_timeout() => Error::Timeout {
                timeout_secs: limit.as_secs(),
            },
            _ => Error::Transport(err),
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self
            .http
            .get(url)
            .header(AUTH_HEADER, self.credentials.auth_header())
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        parse_envelope::<T>(resp)
            .await?
            .ok_or_else(|| Error::FauxApi {
                message: "response carried no data".into(),
                status: None,
            })
    }

    async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
    ) -> Result<Option<T>, Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .header(AUTH_HEADER, self.credentials.auth_header())
            .json(body)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;

        parse_envelope(resp).await
    }
}

/// Check the HTTP status and the `message` field, returning `data`.
async fn parse_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Option<T>, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication {
            message: "FauxAPI rejected the request signature".into(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    if !status.is_success() {
        return Err(Error::FauxApi {
            message: format!("HTTP {status}: {}", preview(&body)),
            status: Some(status.as_u16()),
        });
    }

    let envelope: FauxApiResponse<T> = serde_json::from_str(&body).map_err(|e| {
        Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body: body.clone(),
        }
    })?;

    trace!(callid = ?envelope.callid, action = ?envelope.action, "FauxAPI response");

    if envelope.message == "ok" {
        Ok(envelope.data)
    } else {
        Err(Error::FauxApi {
            message: envelope.message,
            status: Some(status.as_u16()),
        })
    }
}

fn preview(body: &str) -> &str {
    let end = body
        .char_indices()
        .nth(200)
        .map_or(body.len(), |(idx, _)| idx);
    &body[..end]
}
