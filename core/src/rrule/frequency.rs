// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::cell::Cell;
use std::rc::Rc;

use chrono::{Months, NaiveDateTime, TimeDelta};

use crate::error::RecurrenceError;
use crate::rrule::byrule::Granularity;

/// Repetition granularity of a recurrence rule (RFC 5545 FREQ).
///
/// All seven grammar units are representable so a parsed rule can round-trip,
/// but this engine only steps over daily and coarser units; evaluating a
/// sub-daily rule fails with
/// [`RecurrenceError::UnsupportedFrequency`](crate::RecurrenceError::UnsupportedFrequency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Frequency {
    /// Every second
    Secondly,

    /// Every minute
    Minutely,

    /// Every hour
    Hourly,

    /// Every day
    Daily,

    /// Every week
    Weekly,

    /// Every month
    Monthly,

    /// Every year
    Yearly,
}

impl Frequency {
    /// The working granularity the unrefined candidate sequence starts at.
    pub(crate) fn granularity(self) -> Result<Granularity, RecurrenceError> {
        match self {
            Frequency::Daily => Ok(Granularity::Day),
            Frequency::Weekly => Ok(Granularity::Week),
            Frequency::Monthly => Ok(Granularity::Month),
            Frequency::Yearly => Ok(Granularity::Year),
            Frequency::Secondly | Frequency::Minutely | Frequency::Hourly => {
                Err(RecurrenceError::UnsupportedFrequency { frequency: self })
            }
        }
    }
}

/// Consecutive periods the stepper may produce without any value surviving
/// the refinement pipeline before generation is cut off. Keeps impossible
/// filter sets (a day that exists in no month, say) from spinning forever
/// while staying far above any legitimate gap, such as the eight years
/// between leap days.
pub(crate) const MAX_BARREN_PERIODS: u32 = 1_000;

/// Produces the unrefined candidate sequence: the start value itself, then
/// each previous value advanced by one frequency period times the interval.
///
/// Monthly and yearly advancement use calendar arithmetic, clamping to the
/// end of a shorter month (Jan 31 + 1 month = Feb 28). The sequence is
/// strictly increasing and ends only at the supported datetime range, or when
/// the barren-period guard trips.
pub(crate) struct FrequencyStepper {
    frequency: Frequency,
    interval: u32,
    next: Option<NaiveDateTime>,
    barren: Rc<Cell<u32>>,
}

impl FrequencyStepper {
    pub(crate) fn new(
        frequency: Frequency,
        interval: u32,
        start: NaiveDateTime,
        barren: Rc<Cell<u32>>,
    ) -> Self {
        Self {
            frequency,
            interval,
            next: Some(start),
            barren,
        }
    }

    fn advance(&self, current: NaiveDateTime) -> Option<NaiveDateTime> {
        advance_periods(self.frequency, current, i64::from(self.interval))
    }
}

/// `start` advanced by `periods` frequency periods, with monthly and yearly
/// advancement clamping to the end of a shorter month.
pub(crate) fn advance_periods(
    frequency: Frequency,
    start: NaiveDateTime,
    periods: i64,
) -> Option<NaiveDateTime> {
    match frequency {
        Frequency::Daily => start.checked_add_signed(TimeDelta::days(periods)),
        Frequency::Weekly => start.checked_add_signed(TimeDelta::days(7 * periods)),
        Frequency::Monthly => start.checked_add_months(Months::new(u32::try_from(periods).ok()?)),
        Frequency::Yearly => {
            let months = periods.checked_mul(12)?;
            start.checked_add_months(Months::new(u32::try_from(months).ok()?))
        }
        // Rejected before any period arithmetic happens.
        Frequency::Secondly | Frequency::Minutely | Frequency::Hourly => None,
    }
}

impl Iterator for FrequencyStepper {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        if self.barren.get() >= MAX_BARREN_PERIODS {
            tracing::warn!(
                frequency = %self.frequency,
                periods = MAX_BARREN_PERIODS,
                "no occurrence generated for too many consecutive periods, ending sequence"
            );
            return None;
        }
        self.barren.set(self.barren.get() + 1);
        let current = self.next?;
        self.next = self.advance(current);
        Some(current)
    }
}
