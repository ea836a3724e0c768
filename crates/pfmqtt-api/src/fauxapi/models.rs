// FauxAPI wire types.
//
// The firewall configuration is a deep, loosely-typed document. Only the
// pieces the bridge reads are typed; everything else is carried through
// `extra` maps so a whole-collection patch never drops attributes.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Response envelope shared by every FauxAPI action:
/// `{ callid, action, message, data }`.
#[derive(Debug, Deserialize)]
pub struct FauxApiResponse<T> {
    #[serde(default)]
    pub callid: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    pub message: String,
    pub data: Option<T>,
}

/// `data` payload of `config_get`.
#[derive(Debug, Deserialize)]
pub struct ConfigGetData {
    pub config: SystemConfig,
}

/// The firewall's whole configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `filter` section: the ordered rule collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    #[serde(default)]
    pub rule: Vec<FilterRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A single firewall rule.
///
/// `descr` is the human-readable description pfSense shows in the rule
/// table; the bridge uses it as the rule's identity. A rule is disabled
/// when the `disabled` attribute is present, whatever its value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descr: Option<String>,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    disabled: Option<Value>,

    /// All remaining attributes the firewall sends.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FilterRule {
    /// Create a bare rule with the given description.
    pub fn new(descr: impl Into<String>) -> Self {
        Self {
            descr: Some(descr.into()),
            ..Self::default()
        }
    }

    pub fn descr(&self) -> Option<&str> {
        self.descr.as_deref()
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.is_some()
    }

    /// Set (`true`) or remove (`false`) the disabled marker.
    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled.then(|| Value::String(String::new()));
    }
}

/// Deserialize an attribute so that any value, `null` included, reads
/// as present. A missing key falls back to `None` through `default`.
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// Partial configuration submitted to `config_patch`.
///
/// FauxAPI has no row-level rule mutation, so the full rule list is
/// always sent.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPatch {
    pub filter: FilterPatch,
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterPatch {
    pub rule: Vec<FilterRule>,
}

impl ConfigPatch {
    pub fn rules(rules: Vec<FilterRule>) -> Self {
        Self {
            filter: FilterPatch { rule: rules },
        }
    }
}
