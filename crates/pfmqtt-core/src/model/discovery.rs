use serde::{Deserialize, Serialize};

use super::{Availability, DeviceId, SwitchState};
use crate::topics::DeviceTopics;

/// Home Assistant MQTT discovery document for a switch entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchDiscovery {
    pub name: String,
    pub unique_id: String,
    pub availability_topic: String,
    pub payload_available: String,
    pub payload_not_available: String,
    pub state_topic: String,
    pub payload_on: String,
    pub payload_off: String,
    pub command_topic: String,
}

impl SwitchDiscovery {
    pub fn new(descriptor: &str, id: &DeviceId, topics: &DeviceTopics) -> Self {
        Self {
            name: descriptor.to_owned(),
            unique_id: id.to_string(),
            availability_topic: topics.availability.clone(),
            payload_available: Availability::Online.to_string(),
            payload_not_available: Availability::Offline.to_string(),
            state_topic: topics.state.clone(),
            payload_on: SwitchState::On.to_string(),
            payload_off: SwitchState::Off.to_string(),
            command_topic: topics.command.clone(),
        }
    }
}
