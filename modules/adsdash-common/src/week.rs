//! Reporting weeks run Saturday 00:00:00 through Friday 23:59:59, local wall-clock time.
//!
//! Everything here works on calendar dates; the `*_at` variants take "today" explicitly
//! so the arithmetic can be exercised without touching the system clock.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::types::DateRange;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// A single reporting week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekInfo {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub display_range: String,
}

impl WeekInfo {
    /// The week containing `date`.
    pub fn containing(date: NaiveDate) -> Self {
        let start = week_start(date);
        Self::starting(start)
    }

    /// The week containing today's local date.
    pub fn current() -> Self {
        Self::containing(today())
    }

    fn starting(start: NaiveDate) -> Self {
        let end = start + Duration::days(6);
        Self {
            start_date: start,
            end_date: end,
            display_range: format_week_range(start, end),
        }
    }

    /// Saturday 00:00:00 of this week.
    pub fn starts_at(&self) -> NaiveDateTime {
        self.start_date.and_time(NaiveTime::MIN)
    }

    /// Friday 23:59:59 of this week.
    pub fn ends_at(&self) -> NaiveDateTime {
        end_of_day(self.end_date)
    }

    pub fn range(&self) -> DateRange {
        DateRange {
            start: self.start_date,
            end: self.end_date,
        }
    }
}

/// Local calendar date right now.
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// The Saturday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    // Sunday = 0 ... Saturday = 6; Saturday maps to 0 days back.
    let back = (date.weekday().num_days_from_sunday() + 1) % 7;
    date - Duration::days(i64::from(back))
}

/// 23:59:59 on `date`.
pub fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN))
}

/// The `count` weeks strictly before the current one, most recent first.
pub fn previous_weeks(count: u32) -> Vec<WeekInfo> {
    previous_weeks_at(today(), count)
}

pub fn previous_weeks_at(today: NaiveDate, count: u32) -> Vec<WeekInfo> {
    let current_start = week_start(today);
    (1..=i64::from(count))
        .map(|i| WeekInfo::starting(current_start - Duration::days(7 * i)))
        .collect()
}

/// The week `offset` weeks back from the one containing `today`. Offset 0 is the current week.
/// An offset reaching past the earliest representable date yields the current week.
pub fn week_at_offset(today: NaiveDate, offset: u32) -> WeekInfo {
    let current = week_start(today);
    let start = Duration::try_days(7 * i64::from(offset))
        .and_then(|back| current.checked_sub_signed(back))
        .unwrap_or(current);
    WeekInfo::starting(start)
}

/// ISO `YYYY-MM-DD`, used for storage and query keys.
pub fn format_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `"3 — 9 jan 2026"` when both ends share a month, else `"27 dec — 2 jan 2026"`.
pub fn format_week_range(start: NaiveDate, end: NaiveDate) -> String {
    let start_month = MONTHS[start.month0() as usize];
    let end_month = MONTHS[end.month0() as usize];
    if start.month() == end.month() {
        format!("{} — {} {} {}", start.day(), end.day(), end_month, end.year())
    } else {
        format!(
            "{} {} — {} {} {}",
            start.day(),
            start_month,
            end.day(),
            end_month,
            end.year()
        )
    }
}
