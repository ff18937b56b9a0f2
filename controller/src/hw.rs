use std::sync::Arc;

use tracing::info;

use pool_common::{ControllerConfig, PinRole};

/// Boundary to the relay board: two digital relays driven by role plus one
/// PWM channel. The controller never knows which implementation is
/// installed, so logical state stays correct with or without hardware.
pub trait OutputDriver: Send + Sync {
    fn set_digital(&self, role: PinRole, on: bool) -> anyhow::Result<()>;
    fn set_pwm(&self, duty: u8) -> anyhow::Result<()>;
}

/// Inert driver for boards without GPIO access (development hosts, CI).
/// Commands are logged and dropped. A real GPIO transport slots in here as
/// a second `OutputDriver` implementation.
pub struct LogDriver {
    config: ControllerConfig,
}

impl LogDriver {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config }
    }

    fn pin_for(&self, role: PinRole) -> u8 {
        match role {
            PinRole::Pump => self.config.pump_pin,
            PinRole::CellBridge1 => self.config.cell_bridge1_pin,
            PinRole::CellBridge2 => self.config.cell_bridge2_pin,
            PinRole::PwmMirror => self.config.pwm_mirror_pin,
            PinRole::Heartbeat => self.config.heartbeat_pin,
        }
    }
}

impl OutputDriver for LogDriver {
    fn set_digital(&self, role: PinRole, on: bool) -> anyhow::Result<()> {
        info!(
            "gpio{} ({}) -> {}",
            self.pin_for(role),
            role.as_str(),
            if on { "HIGH" } else { "LOW" }
        );
        Ok(())
    }

    fn set_pwm(&self, duty: u8) -> anyhow::Result<()> {
        info!(
            "pwm gpio{} @ {} Hz -> {}%",
            self.config.pwm_pin, self.config.pwm_freq_hz, duty
        );
        Ok(())
    }
}

/// Selected once at startup; the rest of the process only sees the trait.
pub fn select_driver(config: &ControllerConfig) -> Arc<dyn OutputDriver> {
    info!("no GPIO hardware configured, using log-only output driver");
    Arc::new(LogDriver::new(config.clone()))
}
