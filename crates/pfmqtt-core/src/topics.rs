// Topic naming. Every per-device topic is a pure function of the
// configured prefix and the device identifier.

use crate::model::DeviceId;

const RULES_SEGMENT: &str = "rules";
const COMMAND_LEAF: &str = "command";

/// The three per-device topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopics {
    pub availability: String,
    pub state: String,
    pub command: String,
}

impl DeviceTopics {
    pub fn new(prefix: &str, id: &DeviceId) -> Self {
        let base = format!("{prefix}/{RULES_SEGMENT}/{id}");
        Self {
            availability: format!("{base}/availability"),
            state: format!("{base}/state"),
            command: format!("{base}/{COMMAND_LEAF}"),
        }
    }
}

/// `<discovery_prefix>/switch/<id>/config`
pub fn discovery_topic(discovery_prefix: &str, id: &DeviceId) -> String {
    format!("{discovery_prefix}/switch/{id}/config")
}

/// Extract the device identifier from `<prefix>/rules/<id>/command`.
///
/// Returns `None` for anything that is not a command topic under `prefix`.
pub fn device_id_from_command_topic(prefix: &str, topic: &str) -> Option<DeviceId> {
    let rest = topic
        .strip_prefix(prefix)?
        .strip_prefix('/')?
        .strip_prefix(RULES_SEGMENT)?
        .strip_prefix('/')?;
    let (id, leaf) = rest.split_once('/')?;
    (!id.is_empty() && leaf == COMMAND_LEAF).then(|| DeviceId::from(id))
}
