use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Operating mode of the pump. `Off` is not a selectable mode on the wire;
/// it is the fail-safe branch an unknown or unset mode lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolMode {
    Auto,
    Manual,
    Boost,
    Off,
}

impl PoolMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Boost => "boost",
            Self::Off => "off",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown mode '{0}', expected 'auto', 'manual', or 'boost'")]
pub struct ParseModeError(String);

impl FromStr for PoolMode {
    type Err = ParseModeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            "boost" => Ok(Self::Boost),
            other => Err(ParseModeError(other.to_string())),
        }
    }
}

/// Logical roles of the digital outputs; the driver maps these to pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRole {
    Pump,
    CellBridge1,
    CellBridge2,
    PwmMirror,
    Heartbeat,
}

impl PinRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pump => "pump",
            Self::CellBridge1 => "cell_bridge1",
            Self::CellBridge2 => "cell_bridge2",
            Self::PwmMirror => "pwm_mirror",
            Self::Heartbeat => "heartbeat",
        }
    }
}

/// Payload of the `/status` polling endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub time: String,
    pub mode: &'static str,
    pub pump_on: bool,
    pub cell_on: bool,
    pub pwm_duty: u8,
    pub heartbeat_on: bool,
    pub boost_remaining: Option<String>,
    pub manual_remaining: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_selectable_modes() {
        assert_eq!("auto".parse::<PoolMode>(), Ok(PoolMode::Auto));
        assert_eq!("manual".parse::<PoolMode>(), Ok(PoolMode::Manual));
        assert_eq!("boost".parse::<PoolMode>(), Ok(PoolMode::Boost));
    }

    #[test]
    fn off_is_not_selectable_on_the_wire() {
        assert!("off".parse::<PoolMode>().is_err());
        assert!("BOOST".parse::<PoolMode>().is_err());
        assert!("".parse::<PoolMode>().is_err());
    }
}
