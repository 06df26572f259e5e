// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;
use std::iter;

use crate::datetime::LooseDateTime;
use crate::error::RecurrenceError;
use crate::recurrence::cache::SeekCache;
use crate::recurrence::merge::MergedIter;
use crate::rrule::{Bound, RecurrenceRule};

/// One recurring event's schedule: the anchor occurrence (DTSTART), an
/// optional recurrence rule, explicit extra dates (RDATE), and explicit
/// removed dates (EXDATE).
///
/// The recurrence set it describes is the union of the rule's occurrences and
/// the inclusions, minus the exclusions. Exclusion wins over every source,
/// the anchor included. All temporal values of one recurrence must share the
/// anchor's kind; a mismatch is reported when a stream is requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Recurrence {
    anchor: LooseDateTime,
    rule: Option<RecurrenceRule>,
    inclusions: Vec<LooseDateTime>,
    exclusions: Vec<LooseDateTime>,
}

impl Recurrence {
    /// A recurrence consisting of just the anchor occurrence.
    pub fn new(anchor: impl Into<LooseDateTime>) -> Self {
        Self {
            anchor: anchor.into(),
            rule: None,
            inclusions: Vec::new(),
            exclusions: Vec::new(),
        }
    }

    pub fn anchor(&self) -> LooseDateTime {
        self.anchor
    }

    pub fn rule(&self) -> Option<&RecurrenceRule> {
        self.rule.as_ref()
    }

    /// Sets or replaces the recurrence rule.
    pub fn set_rule(&mut self, rule: RecurrenceRule) {
        self.rule = Some(rule);
    }

    /// Adds an explicit occurrence (RDATE).
    pub fn add_inclusion(&mut self, value: impl Into<LooseDateTime>) {
        self.inclusions.push(value.into());
    }

    /// Removes an occurrence from the set (EXDATE). Applies to rule-generated
    /// values, inclusions, and the anchor alike.
    pub fn add_exclusion(&mut self, value: impl Into<LooseDateTime>) {
        self.exclusions.push(value.into());
    }

    /// Streams the recurrence set from the anchor onward.
    pub fn stream<'a>(
        &'a self,
        cache: &'a mut SeekCache,
    ) -> Result<Occurrences<'a>, RecurrenceError> {
        self.stream_from(cache, self.anchor)
    }

    /// Streams the recurrence set from `start` onward. A start before the
    /// anchor is clamped to the anchor; nothing precedes it.
    pub fn stream_from<'a>(
        &'a self,
        cache: &'a mut SeekCache,
        start: impl Into<LooseDateTime>,
    ) -> Result<Occurrences<'a>, RecurrenceError> {
        let start = start.into();
        self.ensure_kind("start", &start)?;
        let start = start.max(self.anchor);
        self.build_stream(cache, start, start)
    }

    /// The latest member of the recurrence set strictly before `before`, if
    /// any.
    pub fn previous(
        &self,
        cache: &mut SeekCache,
        before: impl Into<LooseDateTime>,
    ) -> Result<Option<LooseDateTime>, RecurrenceError> {
        let before = before.into();
        self.ensure_kind("before", &before)?;
        let mut stream = self.build_stream(cache, self.anchor, before)?;
        let mut last = None;
        for value in &mut stream {
            if value >= before {
                break;
            }
            last = Some(value);
        }
        Ok(last)
    }

    fn ensure_kind(
        &self,
        context: &'static str,
        value: &LooseDateTime,
    ) -> Result<(), RecurrenceError> {
        if value.kind() != self.anchor.kind() {
            return Err(RecurrenceError::KindMismatch {
                context,
                expected: self.anchor.kind(),
                got: value.kind(),
            });
        }
        Ok(())
    }

    fn validate_kinds(&self) -> Result<(), RecurrenceError> {
        if let Some(rule) = &self.rule {
            if let Bound::Until(until) = rule.bound() {
                self.ensure_kind("UNTIL", &until)?;
            }
        }
        for value in &self.inclusions {
            self.ensure_kind("RDATE", value)?;
        }
        for value in &self.exclusions {
            self.ensure_kind("EXDATE", value)?;
        }
        Ok(())
    }

    /// `start` is the first value the stream may emit; `seed_target` bounds
    /// the cache lookup (they differ only for [`previous`](Self::previous),
    /// which emits from the anchor but wants a seed near its limit).
    fn build_stream<'a>(
        &'a self,
        cache: &'a mut SeekCache,
        start: LooseDateTime,
        seed_target: LooseDateTime,
    ) -> Result<Occurrences<'a>, RecurrenceError> {
        self.validate_kinds()?;

        let mut inclusions = self.inclusions.clone();
        inclusions.sort();
        inclusions.dedup();
        let included = inclusions.into_iter().map(|value| (value, false));

        let mut exclusions = self.exclusions.clone();
        exclusions.sort();
        exclusions.dedup();

        // All values share the anchor's kind, so one chronological comparator
        // serves the whole stream.
        let cmp =
            |l: &(LooseDateTime, bool), r: &(LooseDateTime, bool)| -> Ordering { l.0.cmp(&r.0) };

        let (source, cache): (Box<dyn Iterator<Item = (LooseDateTime, bool)> + 'a>, _) =
            match &self.rule {
                None => {
                    let anchored = iter::once((self.anchor, false));
                    (Box::new(MergedIter::new(anchored, included, cmp)), None)
                }
                Some(rule) => {
                    // COUNT occurrences are numbered from the anchor, so a
                    // counted rule must replay from the anchor and gains
                    // nothing from the cache.
                    let counted = matches!(rule.bound(), Bound::Count(_));
                    let seed = if counted {
                        self.anchor
                    } else {
                        cache.resolve_seed(self.anchor, rule, seed_target)
                    };
                    let template = self.anchor;
                    let generated = rule
                        .iter_civil(seed.to_civil(), self.anchor.to_civil())?
                        .map(move |civil| (LooseDateTime::from_civil(civil, &template), true));
                    (
                        Box::new(MergedIter::new(generated, included, cmp)),
                        (!counted).then_some(cache),
                    )
                }
            };

        Ok(Occurrences {
            source,
            exclusions,
            start,
            cache,
        })
    }
}

/// Ascending, duplicate-free iterator over a recurrence set.
///
/// Borrows the [`SeekCache`] it was streamed through and feeds generated
/// occurrences back into it as it goes.
pub struct Occurrences<'a> {
    source: Box<dyn Iterator<Item = (LooseDateTime, bool)> + 'a>,
    exclusions: Vec<LooseDateTime>,
    start: LooseDateTime,
    cache: Option<&'a mut SeekCache>,
}

impl Iterator for Occurrences<'_> {
    type Item = LooseDateTime;

    fn next(&mut self) -> Option<LooseDateTime> {
        loop {
            let (value, from_rule) = self.source.next()?;
            // Sampled before exclusion filtering: an excluded occurrence is
            // still a valid generator seed.
            if from_rule {
                if let Some(cache) = &mut self.cache {
                    cache.record(value);
                }
            }
            if self.exclusions.binary_search(&value).is_ok() {
                continue;
            }
            if value < self.start {
                continue;
            }
            return Some(value);
        }
    }
}
