use serde::{Deserialize, Serialize};

pub const HOURS_PER_DAY: usize = 24;

/// 24-hour pump schedule, one flag per local hour of day. Only consulted
/// while the controller is in auto mode.
///
/// Persisted as a plain JSON array. Documents written by hand (or by older
/// firmware) may carry the wrong number of entries; `normalize` replaces any
/// such list wholesale with all-off rather than guessing at intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HourlySchedule(Vec<bool>);

impl Default for HourlySchedule {
    fn default() -> Self {
        Self(vec![false; HOURS_PER_DAY])
    }
}

impl HourlySchedule {
    pub fn normalize(&mut self) {
        if self.0.len() != HOURS_PER_DAY {
            self.0 = vec![false; HOURS_PER_DAY];
        }
    }

    pub fn replace(&mut self, hours: [bool; HOURS_PER_DAY]) {
        self.0 = hours.to_vec();
    }

    /// Out-of-range hours read as off; `normalize` makes that unreachable
    /// for persisted data, but the accessor stays total.
    pub fn is_on(&self, hour: u32) -> bool {
        self.0.get(hour as usize).copied().unwrap_or(false)
    }

    pub fn hours(&self) -> &[bool] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn wrong_length_normalizes_to_all_off() {
        for len in [0, 3, 23, 25, 48] {
            let mut schedule = HourlySchedule(vec![true; len]);
            schedule.normalize();
            assert_eq!(schedule.hours(), &[false; HOURS_PER_DAY]);
        }
    }

    #[test]
    fn correct_length_survives_normalize() {
        let mut hours = [false; HOURS_PER_DAY];
        hours[6] = true;
        hours[18] = true;

        let mut schedule = HourlySchedule::default();
        schedule.replace(hours);
        schedule.normalize();

        assert!(schedule.is_on(6));
        assert!(schedule.is_on(18));
        assert!(!schedule.is_on(7));
    }

    #[test]
    fn out_of_range_hour_reads_off() {
        let mut schedule = HourlySchedule::default();
        schedule.replace([true; HOURS_PER_DAY]);
        assert!(!schedule.is_on(24));
        assert!(!schedule.is_on(99));
    }
}
