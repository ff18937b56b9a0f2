pub mod cell;
pub mod clock;
pub mod config;
pub mod engine;
pub mod schedule;
pub mod types;

pub use cell::cell_bridge_on;
pub use clock::LocalClock;
pub use config::{ControllerConfig, Settings};
pub use engine::PoolEngine;
pub use schedule::{HourlySchedule, HOURS_PER_DAY};
pub use types::{ParseModeError, PinRole, PoolMode, StatusReport};
