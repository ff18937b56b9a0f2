use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Local wall-clock time as a static whole-hour shift from UTC, plus one
/// extra hour while DST is enabled. No timezone database, no transition
/// rules; the offset is configuration.
#[derive(Debug, Clone, Copy)]
pub struct LocalClock {
    base_offset_hours: i32,
}

impl LocalClock {
    pub fn new(base_offset_hours: i32) -> Self {
        Self {
            base_offset_hours: base_offset_hours.clamp(-23, 23),
        }
    }

    pub fn now_local(&self, dst: bool) -> DateTime<FixedOffset> {
        self.local_from_utc(Utc::now(), dst)
    }

    pub fn local_from_utc(&self, utc: DateTime<Utc>, dst: bool) -> DateTime<FixedOffset> {
        let hours = self.base_offset_hours + i32::from(dst);
        let offset = FixedOffset::east_opt(hours * 3600).unwrap_or_else(|| Utc.fix());
        utc.with_timezone(&offset)
    }
}
