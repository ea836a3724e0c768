// Rule reconciliation helpers shared by the synchronizer and the
// read-only status report.

use std::collections::HashMap;

use pfmqtt_api::FilterRule;
use serde::Serialize;

use crate::error::CoreError;
use crate::gateway::FirewallGateway;
use crate::model::{DeviceId, SwitchState};
use crate::registry::IdentityRegistry;

/// Fetch the firewall's whole rule collection.
pub async fn fetch_rules<F: FirewallGateway>(firewall: &F) -> Result<Vec<FilterRule>, CoreError> {
    Ok(firewall.get_configuration().await?.filter.rule)
}

/// Project `descriptors` onto `rules`, keeping the caller's order.
///
/// A descriptor with no live rule yields `None`. When several rules share
/// a description the last one wins.
pub fn select_rules(descriptors: &[String], rules: Vec<FilterRule>) -> Vec<Option<FilterRule>> {
    let by_descr: HashMap<String, FilterRule> = rules
        .into_iter()
        .filter_map(|rule| Some((rule.descr()?.to_owned(), rule)))
        .collect();

    descriptors
        .iter()
        .map(|descriptor| by_descr.get(descriptor.as_str()).cloned())
        .collect()
}

/// One line of the status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleReport {
    pub descriptor: String,
    /// Identifier, if one was ever allocated.
    pub id: Option<DeviceId>,
    /// Whether the firewall currently has a rule with this description.
    pub present: bool,
    /// `ON`/`OFF`, when present.
    pub state: Option<String>,
}

/// Describe every managed descriptor without allocating identifiers.
pub async fn status_report<F: FirewallGateway>(
    firewall: &F,
    registry: &IdentityRegistry,
    descriptors: &[String],
) -> Result<Vec<RuleReport>, CoreError> {
    let rules = select_rules(descriptors, fetch_rules(firewall).await?);
    Ok(descriptors
        .iter()
        .zip(rules)
        .map(|(descriptor, rule)| RuleReport {
            descriptor: descriptor.clone(),
            id: registry.lookup(descriptor),
            present: rule.is_some(),
            state: rule.map(|r| SwitchState::of(&r).to_string()),
        })
        .collect())
}
