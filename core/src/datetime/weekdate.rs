// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Week arithmetic for a configurable week start day (RFC 5545 WKST).
//!
//! Week numbering follows RFC 5545 / ISO 8601: week one of a year is the
//! first week that contains at least four days of that year, with weeks
//! delimited by the given start day.

use chrono::{Datelike, Days, NaiveDate, Weekday};

/// Days between the week start day and `weekday`, walking forward (0..=6).
pub(crate) fn weekday_offset(weekday: Weekday, week_start: Weekday) -> u32 {
    (7 + weekday.num_days_from_monday() - week_start.num_days_from_monday()) % 7
}

/// The first day of the week containing `date`.
pub(crate) fn first_of_week(week_start: Weekday, date: NaiveDate) -> NaiveDate {
    let offset = weekday_offset(date.weekday(), week_start);
    date - Days::new(u64::from(offset))
}

/// The first day of week one of `year`.
fn week1_start(week_start: Weekday, year: i32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let offset = weekday_offset(jan1.weekday(), week_start);
    if offset <= 3 {
        // The week containing January 1st keeps at least four days in this
        // year, so it counts as week one.
        jan1.checked_sub_days(Days::new(u64::from(offset)))
    } else {
        jan1.checked_add_days(Days::new(u64::from(7 - offset)))
    }
}

/// Number of numbered weeks in `year` (52 or 53).
pub(crate) fn weeks_in_year(week_start: Weekday, year: i32) -> Option<u32> {
    let this = week1_start(week_start, year)?;
    let next = week1_start(week_start, year + 1)?;
    Some((next.signed_duration_since(this).num_days() / 7) as u32)
}

/// The date falling on `weekday` of the 1-based `week` of `year`.
pub(crate) fn date_of_week(
    week_start: Weekday,
    year: i32,
    week: u32,
    weekday: Weekday,
) -> Option<NaiveDate> {
    if week == 0 {
        return None;
    }
    let start = week1_start(week_start, year)?;
    let days = u64::from(week - 1) * 7 + u64::from(weekday_offset(weekday, week_start));
    start.checked_add_days(Days::new(days))
}

/// Number of days in the given month.
pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    let first = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(d) => d,
        None => return 0,
    };
    let next = match month {
        12 => NaiveDate::from_ymd_opt(year + 1, 1, 1),
        _ => NaiveDate::from_ymd_opt(year, month + 1, 1),
    };
    match next {
        Some(next) => next.signed_duration_since(first).num_days() as u32,
        None => 0,
    }
}

/// Number of days in the given year.
pub(crate) fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 1, 1).is_some_and(|d| d.leap_year()) {
        366
    } else {
        365
    }
}
