/// Width of one cell-bridge polarity window.
pub const CELL_WINDOW_MINUTES: i64 = 15;

/// Derives the cell-bridge relay state from the pump state and absolute
/// epoch time. While the pump runs, the bridge alternates 15 minutes on /
/// 15 minutes off to share load across the bridge hardware. Windows are
/// aligned to the epoch, not to when the pump started, so restarts do not
/// drift the cycle.
pub fn cell_bridge_on(pump_on: bool, epoch_secs: i64) -> bool {
    if !pump_on {
        return false;
    }
    let window = epoch_secs.div_euclid(60).div_euclid(CELL_WINDOW_MINUTES);
    window.rem_euclid(2) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_minute(minutes: i64) -> i64 {
        minutes * 60
    }

    #[test]
    fn pump_off_forces_bridge_off() {
        for minutes in [0, 7, 15, 29, 30, 1_000_000] {
            assert!(!cell_bridge_on(false, at_minute(minutes)));
        }
    }

    #[test]
    fn windows_alternate_every_fifteen_minutes() {
        assert!(cell_bridge_on(true, at_minute(0)));
        assert!(cell_bridge_on(true, at_minute(14)));
        assert!(!cell_bridge_on(true, at_minute(15)));
        assert!(!cell_bridge_on(true, at_minute(29)));
        assert!(cell_bridge_on(true, at_minute(30)));
        assert!(!cell_bridge_on(true, at_minute(45)));
    }

    #[test]
    fn alignment_is_absolute_not_relative_to_pump_start() {
        // Whatever instant the pump turns on, the window for a given epoch
        // minute is the same.
        let minute_20 = at_minute(20);
        assert!(!cell_bridge_on(true, minute_20));
        assert!(!cell_bridge_on(true, minute_20 + 59));
    }

    #[test]
    fn window_boundary_is_exact() {
        assert!(cell_bridge_on(true, at_minute(15) - 1));
        assert!(!cell_bridge_on(true, at_minute(15)));
    }
}
