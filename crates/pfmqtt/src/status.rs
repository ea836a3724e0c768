//! `pfmqtt status`: show what the bridge would expose, without touching
//! the broker or allocating identifiers.

use std::path::Path;

use pfmqtt_config::Config;
use pfmqtt_core::{IdentityRegistry, build_firewall_client, status_report};

use crate::error::CliError;

pub async fn run(cfg: &Config, config_path: &Path) -> Result<(), CliError> {
    let firewall_config = pfmqtt_config::firewall_config(&cfg.pfsense)
        .map_err(|e| CliError::from_config(e, config_path))?;
    let sync = pfmqtt_config::sync_config(cfg)?;

    let firewall = build_firewall_client(&firewall_config)?;
    let registry = IdentityRegistry::load(cfg.state.identity_file.clone()).await;

    let report = status_report(&firewall, &registry, &sync.rules).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
