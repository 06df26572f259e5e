// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::cell::Cell;
use std::rc::Rc;

use chrono::{Datelike, NaiveDateTime, Weekday};

use crate::datetime::LooseDateTime;
use crate::error::RecurrenceError;
use crate::rrule::byrule::{ByRule, ByWeekday, CivilSeq, PipelineContext};
use crate::rrule::frequency::{advance_periods, FrequencyStepper};
use crate::rrule::Frequency;

/// Termination bound of a recurrence rule.
///
/// COUNT and UNTIL are mutually exclusive in the grammar; the builder keeps
/// whichever was set last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Bound {
    /// The rule repeats forever.
    #[default]
    None,

    /// COUNT: at most this many occurrences, counted from the anchor.
    Count(u32),

    /// UNTIL: no occurrence after this value, inclusive.
    Until(LooseDateTime),
}

/// A validated recurrence rule (RFC 5545 RECUR).
///
/// Construct through [`RecurrenceRule::builder`]; a value of this type always
/// satisfies the grammar's structural constraints (positive interval, at most
/// one refinement rule per kind, values in range).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceRule {
    frequency: Frequency,
    interval: u32,
    bound: Bound,
    // Sorted by kind, which is the evaluation order.
    by_rules: Vec<ByRule>,
    week_start: Weekday,
}

impl RecurrenceRule {
    /// Starts building a rule with the given frequency, interval 1, no bound,
    /// and weeks starting on Monday.
    pub fn builder(frequency: Frequency) -> RecurrenceRuleBuilder {
        RecurrenceRuleBuilder {
            frequency,
            interval: 1,
            bound: Bound::None,
            by_rules: Vec::new(),
            week_start: Weekday::Mon,
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }

    pub fn bound(&self) -> Bound {
        self.bound
    }

    pub fn by_rules(&self) -> &[ByRule] {
        &self.by_rules
    }

    pub fn week_start(&self) -> Weekday {
        self.week_start
    }

    /// Builds the civil-time occurrence sequence of this rule.
    ///
    /// `seed` is where the frequency stepper starts, normally the anchor or a
    /// cached later occurrence; `anchor` is the first value the sequence may
    /// produce. A COUNT-bounded rule always seeds from the anchor, since its
    /// occurrences are counted from there.
    pub(crate) fn iter_civil(
        &self,
        seed: NaiveDateTime,
        anchor: NaiveDateTime,
    ) -> Result<RuleIter, RecurrenceError> {
        let mut granularity = self.frequency.granularity()?;
        let seed = match self.bound {
            Bound::Count(_) => anchor,
            _ => self.align_seed(seed, anchor),
        };
        let barren = Rc::new(Cell::new(0));
        let stepper = FrequencyStepper::new(self.frequency, self.interval, seed, Rc::clone(&barren));
        let ctx = PipelineContext {
            frequency: self.frequency,
            week_start: self.week_start,
        };
        let mut seq: CivilSeq = Box::new(stepper);
        for rule in &self.by_rules {
            seq = rule.apply(seq, &mut granularity, &ctx)?;
        }
        Ok(RuleIter {
            seq,
            barren,
            anchor,
            until: match self.bound {
                Bound::Until(until) => Some(until.to_civil()),
                _ => None,
            },
            remaining: match self.bound {
                Bound::Count(n) => Some(u64::from(n)),
                _ => None,
            },
            last: None,
        })
    }

    /// The latest value on the anchor's period grid (`anchor + k * interval`
    /// periods) not after `seed`.
    ///
    /// A cached occurrence is not necessarily on the grid: an expansion can
    /// place it anywhere inside its generating period, and a BYWEEKNO value
    /// can even fall in the calendar year next to it. Seeding the stepper
    /// off-grid would shift which periods get generated, so the seed is
    /// pulled back first.
    fn align_seed(&self, seed: NaiveDateTime, anchor: NaiveDateTime) -> NaiveDateTime {
        if seed <= anchor {
            return anchor;
        }
        let units = match self.frequency {
            Frequency::Daily => (seed.date() - anchor.date()).num_days(),
            Frequency::Weekly => (seed.date() - anchor.date()).num_days() / 7,
            Frequency::Monthly | Frequency::Yearly => {
                let span = i64::from(seed.year()) * 12 + i64::from(seed.month())
                    - i64::from(anchor.year()) * 12
                    - i64::from(anchor.month());
                if self.frequency == Frequency::Yearly {
                    span / 12
                } else {
                    span
                }
            }
            Frequency::Secondly | Frequency::Minutely | Frequency::Hourly => 0,
        };
        // Month-end clamping and time-of-day can push the first candidate
        // past the seed; backing up one period at a time settles it.
        let mut periods = units / i64::from(self.interval);
        while periods > 0 {
            let candidate = advance_periods(
                self.frequency,
                anchor,
                periods * i64::from(self.interval),
            );
            match candidate {
                Some(candidate) if candidate <= seed => return candidate,
                _ => periods -= 1,
            }
        }
        anchor
    }
}

/// Builder for [`RecurrenceRule`]; validation happens in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RecurrenceRuleBuilder {
    frequency: Frequency,
    interval: u32,
    bound: Bound,
    by_rules: Vec<ByRule>,
    week_start: Weekday,
}

impl RecurrenceRuleBuilder {
    /// Repeat every `interval` periods instead of every period.
    pub fn interval(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    /// Bound the rule to at most `count` occurrences.
    pub fn count(mut self, count: u32) -> Self {
        self.bound = Bound::Count(count);
        self
    }

    /// Bound the rule to occurrences at or before `until`.
    pub fn until(mut self, until: impl Into<LooseDateTime>) -> Self {
        self.bound = Bound::Until(until.into());
        self
    }

    /// Day the week starts on, for WEEKLY rules and BYWEEKNO (default Monday).
    pub fn week_start(mut self, week_start: Weekday) -> Self {
        self.week_start = week_start;
        self
    }

    /// BYMONTH: restrict or expand to these months (1..=12).
    pub fn by_month(mut self, months: Vec<u32>) -> Self {
        self.by_rules.push(ByRule::Month(months));
        self
    }

    /// BYWEEKNO: expand to these weeks of the year, negative from the end.
    pub fn by_week_no(mut self, weeks: Vec<i8>) -> Self {
        self.by_rules.push(ByRule::WeekNo(weeks));
        self
    }

    /// BYYEARDAY: restrict or expand to these days of the year, negative from
    /// the end.
    pub fn by_year_day(mut self, days: Vec<i16>) -> Self {
        self.by_rules.push(ByRule::YearDay(days));
        self
    }

    /// BYMONTHDAY: restrict or expand to these days of the month, negative
    /// from the end.
    pub fn by_month_day(mut self, days: Vec<i8>) -> Self {
        self.by_rules.push(ByRule::MonthDay(days));
        self
    }

    /// BYDAY: restrict or expand to these days of the week.
    pub fn by_day(mut self, days: Vec<ByWeekday>) -> Self {
        self.by_rules.push(ByRule::Day(days));
        self
    }

    /// BYHOUR: restrict or expand to these hours of the day.
    pub fn by_hour(mut self, hours: Vec<u32>) -> Self {
        self.by_rules.push(ByRule::Hour(hours));
        self
    }

    /// BYMINUTE: restrict or expand to these minutes of the hour.
    pub fn by_minute(mut self, minutes: Vec<u32>) -> Self {
        self.by_rules.push(ByRule::Minute(minutes));
        self
    }

    /// BYSECOND: restrict or expand to these seconds of the minute.
    pub fn by_second(mut self, seconds: Vec<u32>) -> Self {
        self.by_rules.push(ByRule::Second(seconds));
        self
    }

    /// BYSETPOS: keep only these positions of each period's generated set,
    /// negative from the end.
    pub fn by_set_pos(mut self, positions: Vec<i32>) -> Self {
        self.by_rules.push(ByRule::SetPos(positions));
        self
    }

    /// Validates and builds the rule.
    pub fn build(self) -> Result<RecurrenceRule, RecurrenceError> {
        if self.interval == 0 {
            return Err(RecurrenceError::InvalidInterval {
                interval: self.interval,
            });
        }

        let mut by_rules = self.by_rules;
        by_rules.sort_by_key(ByRule::kind);
        for pair in by_rules.windows(2) {
            if pair[0].kind() == pair[1].kind() {
                return Err(RecurrenceError::DuplicateByRule {
                    kind: pair[0].kind(),
                });
            }
        }
        for rule in &by_rules {
            rule.validate()?;
        }

        Ok(RecurrenceRule {
            frequency: self.frequency,
            interval: self.interval,
            bound: self.bound,
            by_rules,
            week_start: self.week_start,
        })
    }
}

/// Occurrence sequence of one rule, in civil time.
///
/// Ascending and duplicate-free. Ends at the bound, at the edge of the
/// representable range, or when the barren-period guard trips.
pub(crate) struct RuleIter {
    seq: CivilSeq,
    barren: Rc<Cell<u32>>,
    anchor: NaiveDateTime,
    until: Option<NaiveDateTime>,
    remaining: Option<u64>,
    last: Option<NaiveDateTime>,
}

impl Iterator for RuleIter {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        if self.remaining == Some(0) {
            return None;
        }
        loop {
            let value = self.seq.next()?;
            // The pipeline produced something, so the filter set is not
            // barren even if this particular value is discarded below.
            self.barren.set(0);
            if value < self.anchor {
                continue;
            }
            if self.until.is_some_and(|until| value > until) {
                return None;
            }
            if self.last == Some(value) {
                continue;
            }
            self.last = Some(value);
            if let Some(n) = &mut self.remaining {
                *n -= 1;
            }
            return Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn datetime(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
    }

    fn civil(rule: &RecurrenceRule, anchor: NaiveDateTime, n: usize) -> Vec<NaiveDateTime> {
        rule.iter_civil(anchor, anchor).unwrap().take(n).collect()
    }

    #[test]
    fn build_rejects_zero_interval() {
        let got = RecurrenceRule::builder(Frequency::Daily).interval(0).build();
        assert_eq!(got, Err(RecurrenceError::InvalidInterval { interval: 0 }));
    }

    #[test]
    fn build_rejects_duplicate_rule_kinds() {
        let got = RecurrenceRule::builder(Frequency::Monthly)
            .by_month_day(vec![1])
            .by_month_day(vec![15])
            .build();
        assert_eq!(
            got,
            Err(RecurrenceError::DuplicateByRule {
                kind: crate::ByRuleKind::MonthDay
            })
        );
    }

    #[test]
    fn rules_are_evaluated_in_grammar_order() {
        // BYDAY added before BYMONTH, but BYMONTH must expand first for the
        // June/July/August Thursdays to come out right.
        let rule = RecurrenceRule::builder(Frequency::Yearly)
            .by_day(vec![ByWeekday::every(Weekday::Thu)])
            .by_month(vec![6, 7, 8])
            .build()
            .unwrap();
        let got = civil(&rule, datetime(1997, 6, 5, 9), 14);
        assert_eq!(got[0], datetime(1997, 6, 5, 9));
        assert_eq!(got[12], datetime(1997, 8, 28, 9));
        // Element 14 crosses into the next year's June.
        assert_eq!(got[13], datetime(1998, 6, 4, 9));
    }

    #[test]
    fn count_limits_the_sequence() {
        let rule = RecurrenceRule::builder(Frequency::Daily)
            .count(3)
            .build()
            .unwrap();
        let got: Vec<_> = rule
            .iter_civil(datetime(2015, 11, 9, 10), datetime(2015, 11, 9, 10))
            .unwrap()
            .collect();
        assert_eq!(
            got,
            vec![
                datetime(2015, 11, 9, 10),
                datetime(2015, 11, 10, 10),
                datetime(2015, 11, 11, 10),
            ]
        );
    }

    #[test]
    fn count_seeds_from_the_anchor_even_with_a_later_seed() {
        let rule = RecurrenceRule::builder(Frequency::Daily)
            .count(3)
            .build()
            .unwrap();
        let anchor = datetime(2015, 11, 9, 10);
        let got: Vec<_> = rule
            .iter_civil(datetime(2015, 12, 1, 10), anchor)
            .unwrap()
            .collect();
        assert_eq!(got[0], anchor);
        assert_eq!(got.len(), 3);
    }

    #[test]
    fn until_cuts_the_sequence_inclusively() {
        let rule = RecurrenceRule::builder(Frequency::Daily)
            .until(datetime(2015, 11, 11, 10))
            .build()
            .unwrap();
        let got: Vec<_> = rule
            .iter_civil(datetime(2015, 11, 9, 10), datetime(2015, 11, 9, 10))
            .unwrap()
            .collect();
        assert_eq!(
            got,
            vec![
                datetime(2015, 11, 9, 10),
                datetime(2015, 11, 10, 10),
                datetime(2015, 11, 11, 10),
            ]
        );
    }

    #[test]
    fn values_before_the_anchor_are_dropped() {
        // The anchor's week contains a Monday before the anchor itself.
        let rule = RecurrenceRule::builder(Frequency::Weekly)
            .by_day(vec![ByWeekday::every(Weekday::Mon), ByWeekday::every(Weekday::Fri)])
            .build()
            .unwrap();
        let got = civil(&rule, datetime(2015, 11, 11, 10), 3);
        assert_eq!(
            got,
            vec![
                datetime(2015, 11, 13, 10),
                datetime(2015, 11, 16, 10),
                datetime(2015, 11, 20, 10),
            ]
        );
    }

    #[test]
    fn anchor_not_matching_the_rule_is_not_emitted() {
        // The anchor is a Wednesday but the rule only generates Mondays.
        let rule = RecurrenceRule::builder(Frequency::Weekly)
            .by_day(vec![ByWeekday::every(Weekday::Mon)])
            .build()
            .unwrap();
        let got = civil(&rule, datetime(2015, 11, 11, 10), 2);
        assert_eq!(got, vec![datetime(2015, 11, 16, 10), datetime(2015, 11, 23, 10)]);
    }

    #[test]
    fn overlapping_expansions_are_deduplicated() {
        // Day 10 of the month matches both listed month days only once.
        let rule = RecurrenceRule::builder(Frequency::Monthly)
            .by_month_day(vec![10, -22])
            .build()
            .unwrap();
        // November has 30 days, so -22 is the 9th; December's -22 is the 10th.
        let got = civil(&rule, datetime(2015, 11, 1, 0), 3);
        assert_eq!(
            got,
            vec![
                datetime(2015, 11, 9, 0),
                datetime(2015, 11, 10, 0),
                datetime(2015, 12, 10, 0),
            ]
        );
    }

    #[test]
    fn yearly_by_month_day_negative_tracks_month_length() {
        let rule = RecurrenceRule::builder(Frequency::Monthly)
            .by_month_day(vec![-2])
            .build()
            .unwrap();
        let got = civil(&rule, datetime(2016, 1, 1, 0), 3);
        assert_eq!(
            got,
            vec![
                datetime(2016, 1, 30, 0),
                datetime(2016, 2, 28, 0),
                datetime(2016, 3, 30, 0),
            ]
        );
    }

    #[test]
    fn off_grid_seed_is_pulled_back_onto_the_period_grid() {
        // Week one of 2099 starts on 2098-12-29, in the previous calendar
        // year. A generator seeded there naively would step through even
        // years, while the anchor's grid holds the odd ones.
        let rule = RecurrenceRule::builder(Frequency::Yearly)
            .interval(2)
            .by_week_no(vec![1])
            .build()
            .unwrap();
        let anchor = datetime(2015, 1, 5, 9);
        let seed = datetime(2098, 12, 29, 9);
        let cold: Vec<_> = rule
            .iter_civil(anchor, anchor)
            .unwrap()
            .skip_while(|&v| v < seed)
            .take(3)
            .collect();
        let warm: Vec<_> = rule
            .iter_civil(seed, anchor)
            .unwrap()
            .skip_while(|&v| v < seed)
            .take(3)
            .collect();
        assert_eq!(warm, cold);
    }

    #[test]
    fn build_rejects_empty_value_lists() {
        let got = RecurrenceRule::builder(Frequency::Monthly)
            .by_month_day(vec![])
            .build();
        assert_eq!(
            got,
            Err(RecurrenceError::EmptyByRule {
                kind: crate::ByRuleKind::MonthDay
            })
        );
    }

    #[test]
    fn impossible_filter_set_terminates() {
        // No year has a February 30th; the guard ends the sequence.
        let rule = RecurrenceRule::builder(Frequency::Yearly)
            .by_month(vec![2])
            .by_month_day(vec![30])
            .build()
            .unwrap();
        let got: Vec<_> = rule
            .iter_civil(datetime(2015, 1, 1, 0), datetime(2015, 1, 1, 0))
            .unwrap()
            .collect();
        assert!(got.is_empty());
    }
}
