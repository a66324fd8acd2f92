//! The daily quiet-hours predicate.
//!
//! Grounded in `quiet_hours.py`: the weekend schedule is selected by the
//! weekday nine hours in the future (so a Friday-night session that rolls
//! past midnight still reads as "weekend"), and the window wraps across
//! midnight using modular arithmetic rather than a plain `start <= h <= end`
//! comparison.

use chrono::{DateTime, Datelike, TimeZone, Timelike};

use crate::config::Settings;

/// True if `now` falls inside the active quiet-hours window.
///
/// `weekend` is `(now + 9h).weekday() >= Saturday`, matching the original's
/// choice to index the weekend/weeknight schedule by the day nine hours
/// ahead rather than the calendar day `now` falls on.
pub fn is_quiet_hours<Tz: TimeZone>(now: DateTime<Tz>, settings: &Settings) -> bool {
    let shifted = now.clone() + chrono::Duration::hours(9);
    // chrono's Weekday::num_days_from_monday: Mon=0 .. Sun=6. Sat=5, Sun=6 ⇒ "weekend".
    let weekend = shifted.weekday().num_days_from_monday() >= 5;

    let start = if weekend {
        settings.weekend_quiet_hours_start_time
    } else {
        settings.normal_quiet_hours_start_time
    };
    let end = settings.quiet_hours_end_time;

    let hour = now.hour() as f64 + now.minute() as f64 / 60.0 + now.second() as f64 / 3600.0;

    rem_euclid24(hour - start) <= rem_euclid24(end - start)
}

fn rem_euclid24(x: f64) -> f64 {
    x.rem_euclid(24.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings() -> Settings {
        Settings {
            normal_quiet_hours_start_time: 1.0,
            weekend_quiet_hours_start_time: 2.0,
            quiet_hours_end_time: 9.0,
            ..Settings::default()
        }
    }

    #[test]
    fn test_weeknight_inside_window() {
        // Monday 2024-01-01 is a Monday; 3am is within [1, 9).
        let now = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 3, 0, 0).unwrap();
        assert!(is_quiet_hours(now, &settings()));
    }

    #[test]
    fn test_weeknight_outside_window() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 14, 0, 0).unwrap();
        assert!(!is_quiet_hours(now, &settings()));
    }

    #[test]
    fn test_window_wraps_midnight() {
        // normal_start=1, end=9 doesn't wrap, so use a window that does: start=22, end=6.
        let mut s = settings();
        s.normal_quiet_hours_start_time = 22.0;
        s.quiet_hours_end_time = 6.0;

        let just_after_start = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 23, 0, 0).unwrap();
        assert!(is_quiet_hours(just_after_start, &s));

        let just_before_end = chrono::Utc.with_ymd_and_hms(2024, 1, 2, 5, 0, 0).unwrap();
        assert!(is_quiet_hours(just_before_end, &s));

        let midday = chrono::Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert!(!is_quiet_hours(midday, &s));
    }

    #[test]
    fn test_weekend_schedule_uses_shifted_weekday() {
        // Friday 2024-01-05, 20:00 local: +9h lands on Saturday, so the
        // weekend start (2.0) applies, not the weeknight start (1.0).
        let mut s = settings();
        s.normal_quiet_hours_start_time = 23.0;
        s.weekend_quiet_hours_start_time = 20.0;
        s.quiet_hours_end_time = 23.5;

        let friday_evening = chrono::Utc.with_ymd_and_hms(2024, 1, 5, 20, 30, 0).unwrap();
        assert!(is_quiet_hours(friday_evening, &s));
    }
}
