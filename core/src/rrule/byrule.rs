// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! BYxxx refinement rules (RFC 5545, 3.3.10).
//!
//! Each rule consumes the candidate sequence produced by the frequency
//! stepper (or by the previous rule) together with the current working
//! granularity, and yields a refined sequence. A rule whose unit is finer
//! than the working granularity expands every candidate within its period; a
//! rule whose unit is at or above the working granularity restricts the
//! sequence instead. Expansions emit their matches in ascending order within
//! the period, so the refined sequence stays sorted across period boundaries.

use std::collections::VecDeque;
use std::iter::Peekable;

use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Timelike, Weekday};

use crate::datetime::{
    date_of_week, days_in_month, days_in_year, first_of_week, weekday_offset, weeks_in_year,
};
use crate::error::RecurrenceError;
use crate::rrule::Frequency;

/// The candidate sequence flowing through the refinement pipeline.
pub(crate) type CivilSeq = Box<dyn Iterator<Item = NaiveDateTime>>;

/// Time unit future adjustments apply to.
///
/// Starts at the frequency's unit and narrows as rules are applied: after
/// `FREQ=YEARLY;BYMONTH=3` the working granularity is months, and a
/// subsequent `BYDAY` expands within each month rather than the whole year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Granularity {
    Year,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
}

/// Rule-wide inputs the pipeline rules need besides the sequence itself.
pub(crate) struct PipelineContext {
    pub(crate) frequency: Frequency,
    pub(crate) week_start: Weekday,
}

/// A day-of-week constraint, optionally pinned to the nth occurrence within
/// the enclosing period (`2TH` = second Thursday, `-1FR` = last Friday).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByWeekday {
    /// Day of the week
    pub weekday: Weekday,

    /// 1-based occurrence within the period, negative counting from the end
    pub ordinal: Option<i8>,
}

impl ByWeekday {
    /// Every occurrence of `weekday` within the period.
    pub fn every(weekday: Weekday) -> Self {
        Self {
            weekday,
            ordinal: None,
        }
    }

    /// The nth occurrence of `weekday` within the period, negative from the
    /// end.
    pub fn nth(ordinal: i8, weekday: Weekday) -> Self {
        Self {
            weekday,
            ordinal: Some(ordinal),
        }
    }
}

/// A typed BYxxx refinement rule.
///
/// A recurrence rule holds at most one of each kind; they are evaluated in
/// the fixed RFC order regardless of construction order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ByRule {
    /// BYMONTH: months of the year (1..=12)
    Month(Vec<u32>),

    /// BYWEEKNO: weeks of the year, negative from the last week
    WeekNo(Vec<i8>),

    /// BYYEARDAY: days of the year, negative from December 31st
    YearDay(Vec<i16>),

    /// BYMONTHDAY: days of the month, negative from the last day
    MonthDay(Vec<i8>),

    /// BYDAY: days of the week, optionally with an ordinal
    Day(Vec<ByWeekday>),

    /// BYHOUR: hours of the day (0..=23)
    Hour(Vec<u32>),

    /// BYMINUTE: minutes of the hour (0..=59)
    Minute(Vec<u32>),

    /// BYSECOND: seconds of the minute (0..=60, 60 for leap seconds)
    Second(Vec<u32>),

    /// BYSETPOS: positions within one frequency period's generated set,
    /// negative from the end
    SetPos(Vec<i32>),
}

/// Discriminant of a [`ByRule`], ordered by the RFC-mandated evaluation
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, strum::Display)]
pub enum ByRuleKind {
    /// BYMONTH
    #[strum(serialize = "BYMONTH")]
    Month,

    /// BYWEEKNO
    #[strum(serialize = "BYWEEKNO")]
    WeekNo,

    /// BYYEARDAY
    #[strum(serialize = "BYYEARDAY")]
    YearDay,

    /// BYMONTHDAY
    #[strum(serialize = "BYMONTHDAY")]
    MonthDay,

    /// BYDAY
    #[strum(serialize = "BYDAY")]
    Day,

    /// BYHOUR
    #[strum(serialize = "BYHOUR")]
    Hour,

    /// BYMINUTE
    #[strum(serialize = "BYMINUTE")]
    Minute,

    /// BYSECOND
    #[strum(serialize = "BYSECOND")]
    Second,

    /// BYSETPOS
    #[strum(serialize = "BYSETPOS")]
    SetPos,
}

impl ByRule {
    /// The kind discriminant, which also fixes the evaluation order.
    pub fn kind(&self) -> ByRuleKind {
        match self {
            ByRule::Month(_) => ByRuleKind::Month,
            ByRule::WeekNo(_) => ByRuleKind::WeekNo,
            ByRule::YearDay(_) => ByRuleKind::YearDay,
            ByRule::MonthDay(_) => ByRuleKind::MonthDay,
            ByRule::Day(_) => ByRuleKind::Day,
            ByRule::Hour(_) => ByRuleKind::Hour,
            ByRule::Minute(_) => ByRuleKind::Minute,
            ByRule::Second(_) => ByRuleKind::Second,
            ByRule::SetPos(_) => ByRuleKind::SetPos,
        }
    }

    fn values_len(&self) -> usize {
        match self {
            ByRule::Month(v) | ByRule::Hour(v) | ByRule::Minute(v) | ByRule::Second(v) => v.len(),
            ByRule::WeekNo(v) | ByRule::MonthDay(v) => v.len(),
            ByRule::YearDay(v) => v.len(),
            ByRule::Day(v) => v.len(),
            ByRule::SetPos(v) => v.len(),
        }
    }

    /// Checks every value against the range the grammar allows; a rule must
    /// carry at least one value.
    pub(crate) fn validate(&self) -> Result<(), RecurrenceError> {
        let kind = self.kind();
        if self.values_len() == 0 {
            return Err(RecurrenceError::EmptyByRule { kind });
        }
        let check = |ok: bool, value: i64| {
            if ok {
                Ok(())
            } else {
                Err(RecurrenceError::InvalidByRuleValue { kind, value })
            }
        };
        match self {
            ByRule::Month(values) => values
                .iter()
                .try_for_each(|&v| check((1..=12).contains(&v), i64::from(v))),
            ByRule::WeekNo(values) => values
                .iter()
                .try_for_each(|&v| check(v != 0 && (-53..=53).contains(&v), i64::from(v))),
            ByRule::YearDay(values) => values
                .iter()
                .try_for_each(|&v| check(v != 0 && (-366..=366).contains(&v), i64::from(v))),
            ByRule::MonthDay(values) => values
                .iter()
                .try_for_each(|&v| check(v != 0 && (-31..=31).contains(&v), i64::from(v))),
            ByRule::Day(values) => values.iter().try_for_each(|v| {
                let ordinal = v.ordinal.unwrap_or(1);
                check(
                    ordinal != 0 && (-53..=53).contains(&ordinal),
                    i64::from(ordinal),
                )
            }),
            ByRule::Hour(values) => values
                .iter()
                .try_for_each(|&v| check(v <= 23, i64::from(v))),
            ByRule::Minute(values) => values
                .iter()
                .try_for_each(|&v| check(v <= 59, i64::from(v))),
            ByRule::Second(values) => values
                .iter()
                .try_for_each(|&v| check(v <= 60, i64::from(v))),
            ByRule::SetPos(values) => values
                .iter()
                .try_for_each(|&v| check(v != 0 && (-366..=366).contains(&v), i64::from(v))),
        }
    }

    /// Applies this rule to the candidate sequence, narrowing the working
    /// granularity where the rule expands.
    pub(crate) fn apply(
        &self,
        seq: CivilSeq,
        granularity: &mut Granularity,
        ctx: &PipelineContext,
    ) -> Result<CivilSeq, RecurrenceError> {
        match self {
            ByRule::Month(values) => Ok(apply_month(values.clone(), seq, granularity)),
            ByRule::WeekNo(values) => {
                apply_week_no(values.clone(), seq, granularity, ctx.week_start)
            }
            ByRule::YearDay(values) => Ok(apply_year_day(values.clone(), seq, granularity)),
            ByRule::MonthDay(values) => Ok(apply_month_day(values.clone(), seq, granularity)),
            ByRule::Day(values) => apply_day(values.clone(), seq, granularity, ctx.week_start),
            ByRule::Hour(values) => Ok(apply_time_unit(
                values.clone(),
                seq,
                granularity,
                Granularity::Hour,
            )),
            ByRule::Minute(values) => Ok(apply_time_unit(
                values.clone(),
                seq,
                granularity,
                Granularity::Minute,
            )),
            ByRule::Second(values) => Ok(apply_time_unit(
                values.clone(),
                seq,
                granularity,
                Granularity::Second,
            )),
            ByRule::SetPos(values) => Ok(Box::new(BySetPosIter::new(values.clone(), seq, ctx))),
        }
    }
}

/// Resolves a possibly-negative 1-based ordinal against a period of `total`
/// elements (-1 is the last element).
fn resolve_ordinal(value: i64, total: i64) -> Option<u32> {
    let abs = if value < 0 { total + value + 1 } else { value };
    if (1..=total).contains(&abs) {
        u32::try_from(abs).ok()
    } else {
        None
    }
}

fn apply_month(mut values: Vec<u32>, seq: CivilSeq, granularity: &mut Granularity) -> CivilSeq {
    values.sort_unstable();
    values.dedup();
    if *granularity == Granularity::Year {
        *granularity = Granularity::Month;
        Box::new(seq.flat_map(move |dt| {
            let (year, day, time) = (dt.year(), dt.day(), dt.time());
            values
                .clone()
                .into_iter()
                .filter_map(move |month| {
                    // A day that does not exist in the target month (e.g.
                    // the 31st in February) drops out, per the RFC's
                    // invalid-date handling.
                    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_time(time))
                })
                .collect::<Vec<_>>()
        }))
    } else {
        Box::new(seq.filter(move |dt| values.contains(&dt.month())))
    }
}

fn apply_week_no(
    values: Vec<i8>,
    seq: CivilSeq,
    granularity: &mut Granularity,
    week_start: Weekday,
) -> Result<CivilSeq, RecurrenceError> {
    if *granularity != Granularity::Year {
        return Err(RecurrenceError::UnsupportedByRule {
            kind: ByRuleKind::WeekNo,
            reason: "outside a YEARLY context",
        });
    }
    *granularity = Granularity::Week;
    Ok(Box::new(seq.flat_map(move |dt| {
        let (year, weekday, time) = (dt.year(), dt.weekday(), dt.time());
        let total = weeks_in_year(week_start, year);
        let mut resolved: Vec<u32> = values
            .iter()
            .filter_map(|&week| resolve_ordinal(i64::from(week), i64::from(total?)))
            .collect();
        resolved.sort_unstable();
        resolved.dedup();
        resolved
            .into_iter()
            .filter_map(move |week| {
                // The candidate's weekday is retained within each listed
                // week; a later BYDAY expands to other weekdays.
                date_of_week(week_start, year, week, weekday).map(|d| d.and_time(time))
            })
            .collect::<Vec<_>>()
    })))
}

fn apply_year_day(values: Vec<i16>, seq: CivilSeq, granularity: &mut Granularity) -> CivilSeq {
    if *granularity == Granularity::Year {
        *granularity = Granularity::Day;
        Box::new(seq.flat_map(move |dt| {
            let (year, time) = (dt.year(), dt.time());
            let total = i64::from(days_in_year(year));
            let mut resolved: Vec<u32> = values
                .iter()
                .filter_map(|&day| resolve_ordinal(i64::from(day), total))
                .collect();
            resolved.sort_unstable();
            resolved.dedup();
            resolved
                .into_iter()
                .filter_map(move |ordinal| {
                    NaiveDate::from_yo_opt(year, ordinal).map(|d| d.and_time(time))
                })
                .collect::<Vec<_>>()
        }))
    } else {
        Box::new(seq.filter(move |dt| {
            let total = i64::from(days_in_year(dt.year()));
            let pos = i64::from(dt.ordinal());
            values
                .iter()
                .any(|&day| i64::from(day) == pos || i64::from(day) == pos - 1 - total)
        }))
    }
}

fn apply_month_day(values: Vec<i8>, seq: CivilSeq, granularity: &mut Granularity) -> CivilSeq {
    match *granularity {
        Granularity::Year | Granularity::Month => {
            let whole_year = *granularity == Granularity::Year;
            *granularity = Granularity::Day;
            Box::new(seq.flat_map(move |dt| {
                let (year, time) = (dt.year(), dt.time());
                let months = if whole_year {
                    1..=12
                } else {
                    dt.month()..=dt.month()
                };
                let mut out = Vec::new();
                for month in months {
                    let total = i64::from(days_in_month(year, month));
                    let mut resolved: Vec<u32> = values
                        .iter()
                        .filter_map(|&day| resolve_ordinal(i64::from(day), total))
                        .collect();
                    resolved.sort_unstable();
                    resolved.dedup();
                    out.extend(resolved.into_iter().filter_map(|day| {
                        NaiveDate::from_ymd_opt(year, month, day).map(|d| d.and_time(time))
                    }));
                }
                out
            }))
        }
        _ => Box::new(seq.filter(move |dt| {
            let total = i64::from(days_in_month(dt.year(), dt.month()));
            let pos = i64::from(dt.day());
            values
                .iter()
                .any(|&day| i64::from(day) == pos || i64::from(day) == pos - 1 - total)
        })),
    }
}

fn apply_day(
    values: Vec<ByWeekday>,
    seq: CivilSeq,
    granularity: &mut Granularity,
    week_start: Weekday,
) -> Result<CivilSeq, RecurrenceError> {
    let has_ordinal = values.iter().any(|v| v.ordinal.is_some());
    match *granularity {
        Granularity::Year | Granularity::Month => {
            let whole_year = *granularity == Granularity::Year;
            *granularity = Granularity::Day;
            Ok(Box::new(seq.flat_map(move |dt| {
                let bounds = if whole_year {
                    year_bounds(dt.year())
                } else {
                    month_bounds(dt.year(), dt.month())
                };
                let Some((start, end)) = bounds else {
                    return Vec::new();
                };
                let time = dt.time();
                let mut dates: Vec<NaiveDate> = values
                    .iter()
                    .flat_map(|&spec| weekday_dates_in(start, end, spec))
                    .collect();
                dates.sort_unstable();
                dates.dedup();
                dates.into_iter().map(|d| d.and_time(time)).collect()
            })))
        }
        Granularity::Week => {
            if has_ordinal {
                return Err(RecurrenceError::UnsupportedByRule {
                    kind: ByRuleKind::Day,
                    reason: "with an ordinal in a WEEKLY context",
                });
            }
            *granularity = Granularity::Day;
            Ok(Box::new(seq.flat_map(move |dt| {
                let start = first_of_week(week_start, dt.date());
                let time = dt.time();
                let mut out = Vec::new();
                for offset in 0..7 {
                    let Some(date) = start.checked_add_days(Days::new(offset)) else {
                        continue;
                    };
                    if values.iter().any(|v| v.weekday == date.weekday()) {
                        out.push(date.and_time(time));
                    }
                }
                out
            })))
        }
        _ => {
            if has_ordinal {
                return Err(RecurrenceError::UnsupportedByRule {
                    kind: ByRuleKind::Day,
                    reason: "with an ordinal at day granularity",
                });
            }
            Ok(Box::new(
                seq.filter(move |dt| values.iter().any(|v| v.weekday == dt.weekday())),
            ))
        }
    }
}

fn apply_time_unit(
    mut values: Vec<u32>,
    seq: CivilSeq,
    granularity: &mut Granularity,
    target: Granularity,
) -> CivilSeq {
    values.sort_unstable();
    values.dedup();
    if *granularity < target {
        *granularity = target;
        Box::new(seq.flat_map(move |dt| {
            values
                .clone()
                .into_iter()
                .filter_map(move |value| set_time_unit(dt, target, value))
                .collect::<Vec<_>>()
        }))
    } else {
        Box::new(seq.filter(move |dt| values.contains(&get_time_unit(dt, target))))
    }
}

fn set_time_unit(dt: NaiveDateTime, unit: Granularity, value: u32) -> Option<NaiveDateTime> {
    match unit {
        Granularity::Hour => dt.with_hour(value),
        Granularity::Minute => dt.with_minute(value),
        Granularity::Second => dt.with_second(value),
        _ => None,
    }
}

fn get_time_unit(dt: &NaiveDateTime, unit: Granularity) -> u32 {
    match unit {
        Granularity::Hour => dt.hour(),
        Granularity::Minute => dt.minute(),
        Granularity::Second => dt.second(),
        _ => 0,
    }
}

fn year_bounds(year: i32) -> Option<(NaiveDate, NaiveDate)> {
    Some((
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        NaiveDate::from_ymd_opt(year, 12, 31)?,
    ))
}

fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let last = days_in_month(year, month);
    Some((
        NaiveDate::from_ymd_opt(year, month, 1)?,
        NaiveDate::from_ymd_opt(year, month, last)?,
    ))
}

/// All dates matching a weekday constraint within `start..=end`, ascending;
/// an ordinal selects a single date out of those (or none, when the period
/// holds fewer occurrences).
fn weekday_dates_in(start: NaiveDate, end: NaiveDate, spec: ByWeekday) -> Vec<NaiveDate> {
    let offset = weekday_offset(spec.weekday, start.weekday());
    let Some(first) = start.checked_add_days(Days::new(u64::from(offset))) else {
        return Vec::new();
    };
    let mut all = Vec::new();
    let mut current = first;
    while current <= end {
        all.push(current);
        match current.checked_add_days(Days::new(7)) {
            Some(next) => current = next,
            None => break,
        }
    }
    match spec.ordinal {
        None => all,
        Some(n) => {
            let idx = if n > 0 {
                i64::from(n) - 1
            } else {
                all.len() as i64 + i64::from(n)
            };
            usize::try_from(idx)
                .ok()
                .and_then(|i| all.get(i))
                .map(|&d| vec![d])
                .unwrap_or_default()
        }
    }
}

/// BYSETPOS evaluation: groups the upstream sequence by frequency period,
/// orders each group, and keeps only the listed positions.
struct BySetPosIter {
    inner: Peekable<CivilSeq>,
    positions: Vec<i32>,
    frequency: Frequency,
    week_start: Weekday,
    pending: VecDeque<NaiveDateTime>,
}

impl BySetPosIter {
    fn new(positions: Vec<i32>, seq: CivilSeq, ctx: &PipelineContext) -> Self {
        Self {
            inner: seq.peekable(),
            positions,
            frequency: ctx.frequency,
            week_start: ctx.week_start,
            pending: VecDeque::new(),
        }
    }
}

/// Identifies the frequency period a candidate belongs to.
fn period_key(frequency: Frequency, week_start: Weekday, dt: &NaiveDateTime) -> (i32, u32) {
    match frequency {
        Frequency::Yearly => (dt.year(), 0),
        Frequency::Monthly => (dt.year(), dt.month()),
        Frequency::Weekly => {
            let start = first_of_week(week_start, dt.date());
            (start.year(), start.ordinal())
        }
        _ => (dt.year(), dt.ordinal()),
    }
}

impl Iterator for BySetPosIter {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        loop {
            if let Some(value) = self.pending.pop_front() {
                return Some(value);
            }

            let first = self.inner.next()?;
            let (frequency, week_start) = (self.frequency, self.week_start);
            let key = period_key(frequency, week_start, &first);
            let mut group = vec![first];
            while self
                .inner
                .peek()
                .is_some_and(|dt| period_key(frequency, week_start, dt) == key)
            {
                if let Some(dt) = self.inner.next() {
                    group.push(dt);
                }
            }
            group.sort_unstable();
            group.dedup();

            let len = group.len() as i64;
            let mut picked: Vec<usize> = self
                .positions
                .iter()
                .filter_map(|&pos| {
                    let idx = if pos < 0 {
                        len + i64::from(pos)
                    } else {
                        i64::from(pos) - 1
                    };
                    (0..len).contains(&idx).then_some(idx as usize)
                })
                .collect();
            picked.sort_unstable();
            picked.dedup();
            self.pending.extend(picked.into_iter().map(|i| group[i]));
        }
    }
}
