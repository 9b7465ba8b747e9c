// quiet_hours.rs — Minute-of-day window math.
//
// Quiet hours are the window in which the agent must not message tenants.
// Comparisons are on minute-of-day so the check is pure integer math;
// callers convert a timestamp with `minute_of_day()` first.

use chrono::{DateTime, Timelike, Utc};

use crate::config::QuietHours;

/// Minute-of-day of a UTC timestamp, in [0, 1440).
pub fn minute_of_day(at: &DateTime<Utc>) -> u16 {
    (at.hour() * 60 + at.minute()) as u16
}

/// Whether `minute` falls inside the window [start, end).
///
/// Inclusive of the start, exclusive of the end. When start > end the window
/// wraps past midnight (e.g. 21:00–07:00 covers late evening and early
/// morning). A zero-length window (start == end) contains nothing.
pub fn is_in_quiet_hours(minute: u16, start: u16, end: u16) -> bool {
    if start == end {
        return false;
    }
    if start < end {
        minute >= start && minute < end
    } else {
        minute >= start || minute < end
    }
}

/// Convenience wrapper over a [`QuietHours`] config value.
pub fn in_window(minute: u16, window: &QuietHours) -> bool {
    is_in_quiet_hours(minute, window.start.0, window.end.0)
}
