use serde::{Deserialize, Serialize};

use crate::{schedule::HourlySchedule, types::PoolMode};

/// Static controller configuration: pin assignments and timing constants.
/// Not persisted; the compiled-in defaults match the deployed board.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub pump_pin: u8,
    pub cell_bridge1_pin: u8,
    pub cell_bridge2_pin: u8,
    pub pwm_pin: u8,
    pub pwm_mirror_pin: u8,
    pub heartbeat_pin: u8,
    pub pwm_freq_hz: u32,
    pub timezone_offset_hours: i32,
    pub manual_auto_off_hours: i64,
    pub boost_hours: i64,
    pub scheduler_tick_secs: u64,
    pub cell_tick_secs: u64,
    pub heartbeat_half_period_ms: u64,
    pub tick_error_backoff_secs: u64,
    pub http_port: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            pump_pin: 17,
            cell_bridge1_pin: 27,
            cell_bridge2_pin: 22,
            pwm_pin: 20,
            pwm_mirror_pin: 21,
            heartbeat_pin: 2,
            pwm_freq_hz: 1_000,
            timezone_offset_hours: 10, // AEST
            manual_auto_off_hours: 8,
            boost_hours: 3,
            scheduler_tick_secs: 10,
            cell_tick_secs: 1,
            heartbeat_half_period_ms: 200,
            tick_error_backoff_secs: 5,
            http_port: 5000,
        }
    }
}

/// The single persisted settings document, rewritten in full on every
/// mutation. Every field defaults independently so documents written by
/// older versions still load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_mode")]
    pub mode: PoolMode,
    #[serde(default)]
    pub manual_state: bool,
    /// RFC 3339 deadline for manual auto-off. An unparseable value is
    /// treated as already expired, never as an error.
    #[serde(default)]
    pub manual_on_until: Option<String>,
    #[serde(default)]
    pub schedule: HourlySchedule,
    /// RFC 3339 deadline for boost auto-revert; same parse-failure rule.
    #[serde(default)]
    pub boost_until: Option<String>,
    #[serde(default)]
    pub pwm_duty: u8,
    #[serde(default)]
    pub dst: bool,
    /// Stamped in UTC by the store on every save.
    #[serde(default)]
    pub last_updated: Option<String>,
}

fn default_mode() -> PoolMode {
    PoolMode::Auto
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mode: PoolMode::Auto,
            manual_state: false,
            manual_on_until: None,
            schedule: HourlySchedule::default(),
            boost_until: None,
            pwm_duty: 0,
            dst: false,
            last_updated: None,
        }
    }
}

impl Settings {
    pub fn sanitize(&mut self) {
        self.schedule.normalize();
        if self.pwm_duty > 100 {
            self.pwm_duty = 100;
        }
    }
}
