// ── Domain model ──
//
// Device identifiers, switch payload vocabulary and the discovery
// document announced for every managed rule.

pub mod device_id;
pub mod discovery;
pub mod switch;

pub use device_id::DeviceId;
pub use discovery::SwitchDiscovery;
pub use switch::{Availability, SwitchState};
