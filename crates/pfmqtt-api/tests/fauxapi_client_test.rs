#![allow(clippy::unwrap_used)]
// Integration tests for `FauxApiClient` using wiremock.

use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header_exists, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use std::time::Duration;

use pfmqtt_api::{
    ConfigPatch, Error, FauxApiClient, FauxApiCredentials, FilterRule, TlsMode, TransportConfig,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, FauxApiClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = FauxApiClient::with_client(
        reqwest::Client::new(),
        base_url,
        FauxApiCredentials::new("PFFAtestkey", SecretString::from("testsecret".to_string())),
    );
    (server, client)
}

const API_PATH: &str = "/fauxapi/v1/";

fn config_envelope(rules: serde_json::Value) -> serde_json::Value {
    json!({
        "callid": "5c8a5b3a1c4a2",
        "action": "config_get",
        "message": "ok",
        "data": {
            "config_file": "/cf/conf/config.xml",
            "config": {
                "system": { "hostname": "pfsense" },
                "filter": { "rule": rules }
            }
        }
    })
}

// ── config_get ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_get_configuration_returns_rules() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .and(query_param("action", "config_get"))
        .and(header_exists("fauxapi-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(config_envelope(json!([
            { "descr": "Block-Guest-WAN", "type": "block", "interface": "opt1" },
            { "descr": "Allow-LAN", "type": "pass", "disabled": "" }
        ]))))
        .expect(1)
        .mount(&server)
        .await;

    let config = client.get_configuration().await.unwrap();
    let rules = &config.filter.rule;

    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].descr(), Some("Block-Guest-WAN"));
    assert!(!rules[0].is_disabled());
    assert_eq!(rules[0].extra["interface"], json!("opt1"));
    assert_eq!(rules[1].descr(), Some("Allow-LAN"));
    assert!(rules[1].is_disabled());
    assert!(config.extra.contains_key("system"));
}

#[tokio::test]
async fn test_auth_header_is_signed_per_request() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(config_envelope(json!([]))))
        .mount(&server)
        .await;

    client.get_configuration().await.unwrap();
    client.get_configuration().await.unwrap();

    let requests: Vec<Request> = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let headers: Vec<String> = requests
        .iter()
        .map(|r| {
            r.headers
                .get("fauxapi-auth")
                .unwrap()
                .to_str()
                .unwrap()
                .to_owned()
        })
        .collect();

    for header in &headers {
        let parts: Vec<&str> = header.split(':').collect();
        assert_eq!(parts.len(), 4, "unexpected header shape: {header}");
        assert_eq!(parts[0], "PFFAtestkey");
        assert_eq!(parts[1].len(), "20240101Z000000".len());
        assert_eq!(parts[3].len(), 64);
    }
    assert_ne!(headers[0], headers[1]);
}

#[tokio::test]
async fn test_unauthorized_maps_to_authentication_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "callid": "x",
            "action": "config_get",
            "message": "authentication failed"
        })))
        .mount(&server)
        .await;

    let result = client.get_configuration().await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_non_ok_message_is_an_api_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "callid": "x",
            "action": "config_get",
            "message": "unable to load config"
        })))
        .mount(&server)
        .await;

    let result = client.get_configuration().await;
    match result {
        Err(Error::FauxApi { message, .. }) => assert_eq!(message, "unable to load config"),
        other => panic!("expected FauxApi error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_server_error_carries_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .mount(&server)
        .await;

    let result = client.get_configuration().await;
    assert!(
        matches!(result, Err(Error::FauxApi { status: Some(500), .. })),
        "expected FauxApi 500, got: {result:?}"
    );
}

#[tokio::test]
async fn test_malformed_body_is_a_deserialization_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = client.get_configuration().await;
    match result {
        Err(Error::Deserialization { body, .. }) => assert_eq!(body, "<html>login</html>"),
        other => panic!("expected Deserialization error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_slow_response_reports_configured_timeout() {
    let server = MockServer::start().await;
    let transport = TransportConfig {
        tls: TlsMode::System,
        timeout: Duration::from_secs(1),
    };
    let client = FauxApiClient::new(
        Url::parse(&server.uri()).unwrap(),
        FauxApiCredentials::new("PFFAtestkey", SecretString::from("testsecret".to_string())),
        &transport,
    )
    .unwrap();

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(config_envelope(json!([])))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let result = client.get_configuration().await;
    assert!(
        matches!(result, Err(Error::Timeout { timeout_secs: 1 })),
        "expected Timeout after 1s, got: {result:?}"
    );
}

#[tokio::test]
async fn test_null_disabled_marker_reads_as_disabled() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(config_envelope(json!([
            { "descr": "Block-Guest-WAN", "disabled": null }
        ]))))
        .mount(&server)
        .await;

    let config = client.get_configuration().await.unwrap();
    assert!(config.filter.rule[0].is_disabled());
}

// ── config_patch ────────────────────────────────────────────────────

#[tokio::test]
async fn test_patch_sends_full_rule_list() {
    let (server, client) = setup().await;

    let mut blocked = FilterRule::new("Block-Guest-WAN");
    blocked.set_disabled(true);
    let patch = ConfigPatch::rules(vec![blocked, FilterRule::new("Allow-LAN")]);

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(query_param("action", "config_patch"))
        .and(header_exists("fauxapi-auth"))
        .and(body_json(json!({
            "filter": {
                "rule": [
                    { "descr": "Block-Guest-WAN", "disabled": "" },
                    { "descr": "Allow-LAN" }
                ]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "callid": "5c8a5b3a1c4a3",
            "action": "config_patch",
            "message": "ok",
            "data": {
                "do_backup": true,
                "do_reload": true,
                "previous_config_file": "/cf/conf/backup/config-1552468795.xml"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    client.patch_configuration(&patch).await.unwrap();
}

#[tokio::test]
async fn test_patch_failure_propagates() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(query_param("action", "config_patch"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "callid": "x",
            "action": "config_patch",
            "message": "config_patch failed"
        })))
        .mount(&server)
        .await;

    let result = client
        .patch_configuration(&ConfigPatch::rules(Vec::new()))
        .await;
    assert!(matches!(result, Err(Error::FauxApi { .. })));
}
