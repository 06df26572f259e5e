// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::collections::VecDeque;

use crate::datetime::LooseDateTime;
use crate::rrule::RecurrenceRule;

/// Upper bound on retained occurrences.
const CACHE_RANGE: usize = 51;

/// Only every n-th generated occurrence is retained, spreading the cache over
/// a wide stretch of the sequence instead of its first few values.
const CACHE_SKIP: u32 = 21;

/// Remembers sampled occurrences of one rule so a later stream request can
/// seed its generator near the requested start instead of replaying the whole
/// sequence from the anchor.
///
/// The cache is an optimization only: every cached value is an occurrence the
/// rule itself generated (sampled before exclusion filtering), so seeding
/// from one can never change which values a stream produces, only how much
/// work reaching the first one takes.
///
/// A cache belongs to whatever anchor/rule pair last used it. When it is
/// handed a different pair, it silently resets, so one long-lived cache per
/// event is enough even as the event is rescheduled.
#[derive(Debug, Default)]
pub struct SeekCache {
    values: VecDeque<LooseDateTime>,
    skip_counter: u32,
    provenance: Option<Provenance>,
}

#[derive(Debug, PartialEq)]
struct Provenance {
    anchor: LooseDateTime,
    rule: RecurrenceRule,
}

impl SeekCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The best generator seed for a stream of `rule` from `anchor` that
    /// needs no value after `target`: the latest cached occurrence at or
    /// before `target`, or the anchor when nothing cached qualifies.
    ///
    /// Resets the cache first if it was populated by a different anchor/rule
    /// pair.
    pub(crate) fn resolve_seed(
        &mut self,
        anchor: LooseDateTime,
        rule: &RecurrenceRule,
        target: LooseDateTime,
    ) -> LooseDateTime {
        let current = Provenance {
            anchor,
            rule: rule.clone(),
        };
        if self.provenance.as_ref() != Some(&current) {
            self.values.clear();
            self.skip_counter = 0;
            self.provenance = Some(current);
            return anchor;
        }
        self.values
            .iter()
            .rev()
            .find(|&&value| value <= target)
            .copied()
            .unwrap_or(anchor)
    }

    /// Offers a generated occurrence for retention. Values arrive in
    /// ascending order within one stream, but streams seeded mid-sequence may
    /// later offer values below the retained range; only the ends grow.
    pub(crate) fn record(&mut self, value: LooseDateTime) {
        self.skip_counter += 1;
        if self.skip_counter < CACHE_SKIP {
            return;
        }
        self.skip_counter = 0;

        match (self.values.front(), self.values.back()) {
            (None, _) => self.values.push_back(value),
            (_, Some(&back)) if value > back => {
                if self.values.len() == CACHE_RANGE {
                    self.values.pop_front();
                }
                self.values.push_back(value);
            }
            (Some(&front), _) if value < front => {
                if self.values.len() == CACHE_RANGE {
                    self.values.pop_back();
                }
                self.values.push_front(value);
            }
            // Inside the retained range; the neighborhood is covered already.
            _ => {}
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::rrule::Frequency;

    use super::*;

    fn day(d: u32) -> LooseDateTime {
        LooseDateTime::from(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap() + chrono::Days::new(u64::from(d)))
    }

    fn rule() -> RecurrenceRule {
        RecurrenceRule::builder(Frequency::Daily).build().unwrap()
    }

    fn populated(anchor: LooseDateTime, rule: &RecurrenceRule, days: u32) -> SeekCache {
        let mut cache = SeekCache::new();
        cache.resolve_seed(anchor, rule, anchor);
        for d in 0..days {
            cache.record(day(d));
        }
        cache
    }

    #[test]
    fn empty_cache_seeds_from_the_anchor() {
        let mut cache = SeekCache::new();
        assert_eq!(cache.resolve_seed(day(0), &rule(), day(100)), day(0));
    }

    #[test]
    fn seed_is_the_latest_value_at_or_before_the_target() {
        let rule = rule();
        let mut cache = populated(day(0), &rule, 200);
        // Every 21st offer is retained: days 20, 41, 62, ...
        assert_eq!(cache.resolve_seed(day(0), &rule, day(70)), day(62));
        assert_eq!(cache.resolve_seed(day(0), &rule, day(62)), day(62));
        assert_eq!(cache.resolve_seed(day(0), &rule, day(10)), day(0));
    }

    #[test]
    fn different_rule_resets_the_cache() {
        let old = rule();
        let mut cache = populated(day(0), &old, 200);
        let new = RecurrenceRule::builder(Frequency::Daily)
            .interval(2)
            .build()
            .unwrap();
        assert_eq!(cache.resolve_seed(day(0), &new, day(70)), day(0));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn different_anchor_resets_the_cache() {
        let rule = rule();
        let mut cache = populated(day(0), &rule, 200);
        assert_eq!(cache.resolve_seed(day(1), &rule, day(70)), day(1));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn retention_is_bounded() {
        let rule = rule();
        let cache = populated(day(0), &rule, 10_000);
        assert!(cache.len() <= CACHE_RANGE);
    }

    #[test]
    fn values_below_the_range_grow_the_front() {
        let rule = rule();
        let mut cache = SeekCache::new();
        cache.resolve_seed(day(100), &rule, day(100));
        for d in 100..200 {
            cache.record(day(d));
        }
        // A later stream seeded further back offers earlier values; the
        // first retained one lands below the previously cached range.
        for d in 0..100 {
            cache.record(day(d));
        }
        let seed = cache.resolve_seed(day(100), &rule, day(119));
        assert!(seed < day(120));
        assert!(seed >= day(0));
    }
}
