//! Calendar-day interpretation in the pair's shared time zone.
//!
//! Both participants see the same "today": day boundaries are computed in one
//! configured UTC offset rather than in each device's local zone.

use chrono::{DateTime, Days, FixedOffset, NaiveDate, Utc};

/// A calendar date pinned to a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDay {
    date: NaiveDate,
    offset: FixedOffset,
}

impl CalendarDay {
    pub fn new(date: NaiveDate, offset: FixedOffset) -> Self {
        Self { date, offset }
    }

    /// The calendar day containing `instant` in `offset`.
    pub fn containing(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            date: instant.with_timezone(&offset).date_naive(),
            offset,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Whether `instant` falls on this day in this day's offset.
    pub fn contains(&self, instant: &DateTime<Utc>) -> bool {
        instant.with_timezone(&self.offset).date_naive() == self.date
    }

    /// The day `days` before this one, same offset.
    pub fn days_before(&self, days: u64) -> Option<Self> {
        let date = self.date.checked_sub_days(Days::new(days))?;
        Some(Self::new(date, self.offset))
    }
}

/// Builds an offset from whole minutes east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

/// Offset of the host's local zone right now.
pub fn host_offset() -> FixedOffset {
    *chrono::Local::now().offset()
}

#[cfg(test)]
mod tests {
    use super::{offset_from_minutes, CalendarDay};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn contains_uses_shared_offset_not_utc() {
        let shanghai = offset_from_minutes(8 * 60).expect("valid offset");
        let day = CalendarDay::new(
            NaiveDate::from_ymd_opt(2026, 10, 16).expect("valid date"),
            shanghai,
        );

        // 2026-10-15T17:30Z is 01:30 on the 16th in UTC+8.
        let early = Utc.with_ymd_and_hms(2026, 10, 15, 17, 30, 0).unwrap();
        assert!(day.contains(&early));

        // 2026-10-16T16:30Z is already the 17th in UTC+8.
        let late = Utc.with_ymd_and_hms(2026, 10, 16, 16, 30, 0).unwrap();
        assert!(!day.contains(&late));
    }

    #[test]
    fn offset_out_of_range_is_rejected() {
        assert!(offset_from_minutes(25 * 60).is_none());
        assert!(offset_from_minutes(i32::MAX).is_none());
    }
}
