// ── External collaborator seams ──
//
// The synchronizer talks to the firewall and the broker only through
// these two traits. `pfmqtt-api` supplies the production adapters;
// tests substitute in-memory fakes.

use std::future::Future;

use pfmqtt_api::transport::{TlsMode, TransportConfig};
use pfmqtt_api::{
    ConfigPatch, FauxApiClient, FauxApiCredentials, MqttBus, MqttSettings, QoS, SystemConfig,
};

use crate::config::{BusConfig, FirewallConfig, TlsVerification};
use crate::error::CoreError;

/// Delivery guarantee requested for a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Fire and forget (QoS 0). Used for state updates.
    BestEffort,
    /// Acknowledged (QoS 1). Used for discovery and availability.
    AtLeastOnce,
}

impl From<Delivery> for QoS {
    fn from(delivery: Delivery) -> Self {
        match delivery {
            Delivery::BestEffort => QoS::AtMostOnce,
            Delivery::AtLeastOnce => QoS::AtLeastOnce,
        }
    }
}

/// Whole-configuration read/patch access to the firewall.
pub trait FirewallGateway: Send + Sync + 'static {
    fn get_configuration(&self) -> impl Future<Output = Result<SystemConfig, CoreError>> + Send;

    fn patch_configuration(
        &self,
        patch: &ConfigPatch,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

/// Publish/subscribe over named topics.
pub trait BusGateway: Send + Sync + 'static {
    fn publish(
        &self,
        topic: &str,
        payload: Vec<u8>,
        delivery: Delivery,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), CoreError>> + Send;
}

// ── Production adapters ──────────────────────────────────────────────

impl FirewallGateway for FauxApiClient {
    async fn get_configuration(&self) -> Result<SystemConfig, CoreError> {
        Ok(FauxApiClient::get_configuration(self).await?)
    }

    async fn patch_configuration(&self, patch: &ConfigPatch) -> Result<(), CoreError> {
        Ok(FauxApiClient::patch_configuration(self, patch).await?)
    }
}

impl BusGateway for MqttBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>, delivery: Delivery) -> Result<(), CoreError> {
        Ok(MqttBus::publish(self, topic, payload, delivery.into()).await?)
    }

    async fn subscribe(&self, topic: &str) -> Result<(), CoreError> {
        Ok(MqttBus::subscribe(self, topic, QoS::AtMostOnce).await?)
    }
}

// ── Construction helpers ─────────────────────────────────────────────

/// Build the HTTP transport config from our TLS/timeout settings.
fn build_transport(config: &FirewallConfig) -> TransportConfig {
    TransportConfig {
        tls: match &config.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        },
        timeout: config.timeout,
    }
}

/// Create the FauxAPI client for `config`.
pub fn build_firewall_client(config: &FirewallConfig) -> Result<FauxApiClient, CoreError> {
    let credentials = FauxApiCredentials::new(config.api_key.clone(), config.api_secret.clone());
    Ok(FauxApiClient::new(
        config.url.clone(),
        credentials,
        &build_transport(config),
    )?)
}

/// Broker connection parameters for `config`.
pub fn bus_settings(config: &BusConfig) -> MqttSettings {
    MqttSettings {
        host: config.host.clone(),
        port: config.port,
        client_id: config.client_id.clone(),
        username: config.username.clone(),
        password: config.password.clone(),
        keep_alive: config.keep_alive,
    }
}
