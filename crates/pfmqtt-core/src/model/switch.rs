// Payload vocabulary shared by the state, command and availability topics.

use pfmqtt_api::FilterRule;
use strum::{AsRefStr, Display, EnumString};

/// On/off state of a rule switch. `ON` means the rule is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
pub enum SwitchState {
    #[strum(serialize = "ON")]
    On,
    #[strum(serialize = "OFF")]
    Off,
}

impl SwitchState {
    pub fn from_disabled(disabled: bool) -> Self {
        if disabled { Self::Off } else { Self::On }
    }

    /// State of a live firewall rule.
    pub fn of(rule: &FilterRule) -> Self {
        Self::from_disabled(rule.is_disabled())
    }

    /// Interpret a command payload. Anything but `ON` switches the rule off.
    pub fn from_command(payload: &str) -> Self {
        if payload.trim() == Self::On.as_ref() {
            Self::On
        } else {
            Self::Off
        }
    }

    pub fn is_disabled(self) -> bool {
        self == Self::Off
    }
}

/// Device liveness as reported on the availability topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr, EnumString)]
pub enum Availability {
    #[strum(serialize = "online")]
    Online,
    #[strum(serialize = "offline")]
    Offline,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_disabled_marker() {
        let mut rule = FilterRule::new("Block-Guest-WAN");
        assert_eq!(SwitchState::of(&rule), SwitchState::On);
        rule.set_disabled(true);
        assert_eq!(SwitchState::of(&rule), SwitchState::Off);
    }

    #[test]
    fn only_exact_on_enables() {
        assert_eq!(SwitchState::from_command("ON"), SwitchState::On);
        assert_eq!(SwitchState::from_command(" ON\n"), SwitchState::On);
        assert_eq!(SwitchState::from_command("on"), SwitchState::Off);
        assert_eq!(SwitchState::from_command("OFF"), SwitchState::Off);
        assert_eq!(SwitchState::from_command(""), SwitchState::Off);
    }

    #[test]
    fn payload_strings() {
        assert_eq!(SwitchState::On.to_string(), "ON");
        assert_eq!(SwitchState::Off.as_ref(), "OFF");
        assert_eq!(Availability::Online.as_ref(), "online");
        assert_eq!("offline".parse::<Availability>(), Ok(Availability::Offline));
    }
}
