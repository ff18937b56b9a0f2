use chrono::{DateTime, Duration, FixedOffset, Timelike};

use crate::{
    clock::LocalClock,
    config::{ControllerConfig, Settings},
    schedule::HOURS_PER_DAY,
    types::{PoolMode, StatusReport},
};

/// Arbitrates among the three control sources (manual override, 24-hour
/// schedule, timed boost) and decides the pump's desired state. Owns the
/// settings document; callers persist a snapshot after any mutating call.
///
/// Every operation takes `now` explicitly so timer behavior is testable;
/// `local_now` is the production source for it.
#[derive(Debug, Clone)]
pub struct PoolEngine {
    config: ControllerConfig,
    clock: LocalClock,
    settings: Settings,
}

impl PoolEngine {
    pub fn new(config: ControllerConfig, mut settings: Settings) -> Self {
        settings.sanitize();
        let clock = LocalClock::new(config.timezone_offset_hours);
        Self {
            config,
            clock,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn local_now(&self) -> DateTime<FixedOffset> {
        self.clock.now_local(self.settings.dst)
    }

    /// Switching into boost also arms its auto-revert deadline. Switching
    /// between the other modes leaves existing deadlines untouched; the
    /// expiry checks are gated on the active mode.
    pub fn set_mode(&mut self, mode: PoolMode, now: DateTime<FixedOffset>) {
        self.settings.mode = mode;
        if mode == PoolMode::Boost {
            self.settings.boost_until =
                Some((now + Duration::hours(self.config.boost_hours)).to_rfc3339());
        }
    }

    /// Manual on arms the safety auto-off deadline; manual off clears it.
    /// Either way the controller is now in manual mode.
    pub fn set_manual(&mut self, on: bool, now: DateTime<FixedOffset>) {
        self.settings.manual_state = on;
        self.settings.manual_on_until = on.then(|| {
            (now + Duration::hours(self.config.manual_auto_off_hours)).to_rfc3339()
        });
        self.settings.mode = PoolMode::Manual;
    }

    /// Wholesale replacement; takes effect on the next auto evaluation.
    pub fn save_schedule(&mut self, hours: [bool; HOURS_PER_DAY]) {
        self.settings.schedule.replace(hours);
    }

    /// Clamps to 0..=100 and returns the stored value.
    pub fn set_pwm_duty(&mut self, duty: i64) -> u8 {
        let clamped = duty.clamp(0, 100) as u8;
        self.settings.pwm_duty = clamped;
        clamped
    }

    /// Affects future clock reads only.
    pub fn set_dst(&mut self, enabled: bool) {
        self.settings.dst = enabled;
    }

    /// Returns true when the mode changed. A deadline that fails to parse
    /// counts as expired so a corrupt value can never pin boost mode on.
    pub fn check_boost_expiry(&mut self, now: DateTime<FixedOffset>) -> bool {
        if self.settings.mode != PoolMode::Boost {
            return false;
        }
        let Some(raw) = self.settings.boost_until.as_deref() else {
            return false;
        };
        if !deadline_reached(raw, now) {
            return false;
        }
        self.settings.boost_until = None;
        self.settings.mode = PoolMode::Auto;
        true
    }

    pub fn check_manual_expiry(&mut self, now: DateTime<FixedOffset>) -> bool {
        if !self.settings.manual_state {
            return false;
        }
        let Some(raw) = self.settings.manual_on_until.as_deref() else {
            return false;
        };
        if !deadline_reached(raw, now) {
            return false;
        }
        self.settings.manual_state = false;
        self.settings.manual_on_until = None;
        self.settings.mode = PoolMode::Auto;
        true
    }

    pub fn desired_pump_state(&self, now: DateTime<FixedOffset>) -> bool {
        match self.settings.mode {
            PoolMode::Manual => self.settings.manual_state,
            PoolMode::Auto => self.settings.schedule.is_on(now.hour()),
            PoolMode::Boost => true,
            // Fail-safe: anything outside the three real modes keeps the
            // pump off.
            PoolMode::Off => false,
        }
    }

    pub fn boost_remaining(&self, now: DateTime<FixedOffset>) -> Option<String> {
        if self.settings.mode != PoolMode::Boost {
            return None;
        }
        remaining_hms(self.settings.boost_until.as_deref()?, now)
    }

    pub fn manual_remaining(&self, now: DateTime<FixedOffset>) -> Option<String> {
        if !self.settings.manual_state {
            return None;
        }
        remaining_hms(self.settings.manual_on_until.as_deref()?, now)
    }

    /// Assembles the polling payload. Runs both expiry checks first so a
    /// client polling status observes the auto fallback even if the
    /// background tick has not fired yet; the returned flag tells the
    /// caller to persist and re-apply the pump output.
    pub fn status(
        &mut self,
        now: DateTime<FixedOffset>,
        pump_on: bool,
        cell_on: bool,
        heartbeat_on: bool,
    ) -> (StatusReport, bool) {
        let expired = self.check_boost_expiry(now) | self.check_manual_expiry(now);

        let report = StatusReport {
            time: now.format("%Y-%m-%d %H:%M:%S").to_string(),
            mode: self.settings.mode.as_str(),
            pump_on,
            cell_on,
            pwm_duty: self.settings.pwm_duty,
            heartbeat_on,
            boost_remaining: self.boost_remaining(now),
            manual_remaining: self.manual_remaining(now),
        };

        (report, expired)
    }
}

fn deadline_reached(raw: &str, now: DateTime<FixedOffset>) -> bool {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(deadline) => now >= deadline,
        Err(_) => true,
    }
}

fn remaining_hms(raw: &str, now: DateTime<FixedOffset>) -> Option<String> {
    let deadline = DateTime::parse_from_rfc3339(raw).ok()?;
    let seconds = (deadline - now).num_seconds();
    if seconds <= 0 {
        return None;
    }
    let hours = seconds / 3600;
    let rest = seconds % 3600;
    Some(format!("{:02}:{:02}:{:02}", hours, rest / 60, rest % 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn local(hour: u32, minute: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(10 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 14, hour, minute, 0)
            .unwrap()
    }

    fn engine() -> PoolEngine {
        PoolEngine::new(ControllerConfig::default(), Settings::default())
    }

    #[test]
    fn pwm_duty_is_clamped() {
        let mut engine = engine();
        assert_eq!(engine.set_pwm_duty(150), 100);
        assert_eq!(engine.settings().pwm_duty, 100);
        assert_eq!(engine.set_pwm_duty(-5), 0);
        assert_eq!(engine.set_pwm_duty(42), 42);
        assert_eq!(engine.settings().pwm_duty, 42);
    }

    #[test]
    fn boost_arms_three_hour_deadline() {
        let mut engine = engine();
        let now = local(9, 0);
        engine.set_mode(PoolMode::Boost, now);

        let expected = (now + Duration::hours(3)).to_rfc3339();
        assert_eq!(engine.settings().boost_until.as_deref(), Some(&*expected));
        assert!(engine.desired_pump_state(now));
    }

    #[test]
    fn boost_expires_only_after_deadline() {
        let mut engine = engine();
        let now = local(9, 0);
        engine.set_mode(PoolMode::Boost, now);

        assert!(!engine.check_boost_expiry(now + Duration::hours(3) - Duration::seconds(1)));
        assert_eq!(engine.settings().mode, PoolMode::Boost);

        assert!(engine.check_boost_expiry(now + Duration::hours(3) + Duration::seconds(1)));
        assert_eq!(engine.settings().mode, PoolMode::Auto);
        assert_eq!(engine.settings().boost_until, None);
    }

    #[test]
    fn unparseable_boost_deadline_expires_immediately() {
        let mut engine = engine();
        engine.settings.mode = PoolMode::Boost;
        engine.settings.boost_until = Some("not-a-timestamp".to_string());

        assert!(engine.check_boost_expiry(local(9, 0)));
        assert_eq!(engine.settings().mode, PoolMode::Auto);
        assert_eq!(engine.settings().boost_until, None);
    }

    #[test]
    fn boost_expiry_is_gated_on_boost_mode() {
        let mut engine = engine();
        let now = local(9, 0);
        engine.set_mode(PoolMode::Boost, now);
        engine.set_mode(PoolMode::Manual, now);

        // Stale deadline left behind by the mode switch must not fire.
        assert!(!engine.check_boost_expiry(now + Duration::hours(4)));
        assert_eq!(engine.settings().mode, PoolMode::Manual);
    }

    #[test]
    fn manual_on_arms_eight_hour_auto_off() {
        let mut engine = engine();
        let now = local(9, 0);
        engine.set_manual(true, now);

        assert_eq!(engine.settings().mode, PoolMode::Manual);
        assert!(engine.settings().manual_state);
        assert!(engine.desired_pump_state(now));

        assert!(!engine.check_manual_expiry(now + Duration::hours(8) - Duration::seconds(1)));
        assert!(engine.check_manual_expiry(now + Duration::hours(8) + Duration::seconds(1)));
        assert_eq!(engine.settings().mode, PoolMode::Auto);
        assert!(!engine.settings().manual_state);
        assert_eq!(engine.settings().manual_on_until, None);
    }

    #[test]
    fn manual_off_has_no_deadline() {
        let mut engine = engine();
        let now = local(9, 0);
        engine.set_manual(true, now);
        engine.set_manual(false, now);

        assert_eq!(engine.settings().manual_on_until, None);
        assert!(!engine.desired_pump_state(now));
        assert!(!engine.check_manual_expiry(now + Duration::hours(24)));
    }

    #[test]
    fn unparseable_manual_deadline_reverts_to_auto() {
        let mut engine = engine();
        engine.settings.mode = PoolMode::Manual;
        engine.settings.manual_state = true;
        engine.settings.manual_on_until = Some("garbage".to_string());

        assert!(engine.check_manual_expiry(local(9, 0)));
        assert_eq!(engine.settings().mode, PoolMode::Auto);
        assert!(!engine.settings().manual_state);
    }

    #[test]
    fn auto_mode_follows_schedule() {
        let mut engine = engine();
        let mut hours = [false; HOURS_PER_DAY];
        hours[14] = true;
        engine.save_schedule(hours);

        assert!(engine.desired_pump_state(local(14, 30)));
        assert!(!engine.desired_pump_state(local(15, 0)));

        hours[14] = false;
        engine.save_schedule(hours);
        assert!(!engine.desired_pump_state(local(14, 30)));
    }

    #[test]
    fn unknown_mode_is_fail_safe_off() {
        let mut engine = engine();
        engine.settings.mode = PoolMode::Off;
        engine.settings.manual_state = true;
        engine.save_schedule([true; HOURS_PER_DAY]);

        assert!(!engine.desired_pump_state(local(12, 0)));
    }

    #[test]
    fn status_read_path_performs_auto_fallback() {
        let mut engine = engine();
        let now = local(9, 0);
        engine.set_mode(PoolMode::Boost, now);

        let (report, expired) = engine.status(now + Duration::hours(4), true, false, false);

        assert!(expired);
        assert_eq!(report.mode, "auto");
        assert_eq!(report.boost_remaining, None);
        assert_eq!(engine.settings().mode, PoolMode::Auto);
    }

    #[test]
    fn status_reports_boost_countdown() {
        let mut engine = engine();
        let now = local(9, 0);
        engine.set_mode(PoolMode::Boost, now);

        let (report, expired) = engine.status(now + Duration::hours(1), true, true, false);

        assert!(!expired);
        assert_eq!(report.mode, "boost");
        assert_eq!(report.boost_remaining.as_deref(), Some("02:00:00"));
        assert_eq!(report.manual_remaining, None);
    }

    #[test]
    fn status_reports_manual_countdown() {
        let mut engine = engine();
        let now = local(9, 0);
        engine.set_manual(true, now);

        let (report, _) =
            engine.status(now + Duration::minutes(30) + Duration::seconds(15), true, false, false);

        assert_eq!(report.manual_remaining.as_deref(), Some("07:29:45"));
    }

    #[test]
    fn status_time_uses_local_format() {
        let mut engine = engine();
        let (report, _) = engine.status(local(7, 5), false, false, false);
        assert_eq!(report.time, "2026-03-14 07:05:00");
    }

    #[test]
    fn countdown_vanishes_at_deadline() {
        let mut engine = engine();
        let now = local(9, 0);
        engine.set_mode(PoolMode::Boost, now);
        assert_eq!(engine.boost_remaining(now + Duration::hours(3)), None);
    }
}
