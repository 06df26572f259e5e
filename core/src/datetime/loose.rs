// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, offset::LocalResult};
use chrono_tz::Tz;

/// A date and time that may be in different formats, such as date only,
/// floating time, or a zone-aware time.
///
/// Every temporal value of one recurring component shares one concrete kind;
/// the engine checks this once per stream request and rejects mixed kinds
/// with [`RecurrenceError::KindMismatch`](crate::RecurrenceError::KindMismatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LooseDateTime {
    /// Date only without time.
    DateOnly(NaiveDate),

    /// Floating date and time without timezone.
    Floating(NaiveDateTime),

    /// Date and time anchored to an IANA timezone.
    Zoned(DateTime<Tz>),
}

/// The concrete kind of a [`LooseDateTime`] value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum DateTimeKind {
    /// Date only without time
    #[strum(serialize = "date-only")]
    DateOnly,

    /// Floating date and time
    #[strum(serialize = "floating")]
    Floating,

    /// Zone-aware date and time
    #[strum(serialize = "zoned")]
    Zoned,
}

impl LooseDateTime {
    /// Returns the concrete kind of this value.
    pub fn kind(&self) -> DateTimeKind {
        match self {
            LooseDateTime::DateOnly(_) => DateTimeKind::DateOnly,
            LooseDateTime::Floating(_) => DateTimeKind::Floating,
            LooseDateTime::Zoned(_) => DateTimeKind::Zoned,
        }
    }

    /// Returns the date part.
    pub fn date(&self) -> NaiveDate {
        match self {
            LooseDateTime::DateOnly(d) => *d,
            LooseDateTime::Floating(dt) => dt.date(),
            LooseDateTime::Zoned(dt) => dt.date_naive(),
        }
    }

    /// Returns the time part, if available.
    pub fn time(&self) -> Option<NaiveTime> {
        match self {
            LooseDateTime::DateOnly(_) => None,
            LooseDateTime::Floating(dt) => Some(dt.time()),
            LooseDateTime::Zoned(dt) => Some(dt.time()),
        }
    }

    /// Projects this value onto the civil (wall-clock) timeline the rule
    /// pipeline operates on. A date-only value projects to midnight.
    pub(crate) fn to_civil(self) -> NaiveDateTime {
        match self {
            LooseDateTime::DateOnly(d) => d.and_time(NaiveTime::MIN),
            LooseDateTime::Floating(dt) => dt,
            LooseDateTime::Zoned(dt) => dt.naive_local(),
        }
    }

    /// Rehydrates a civil value back into the concrete kind of `like`.
    ///
    /// For zoned values a civil time that is ambiguous in the zone resolves
    /// to the earliest interpretation, and a nonexistent one (DST gap) falls
    /// back to the UTC reading of the civil value. Both fallbacks are logged.
    pub(crate) fn from_civil(civil: NaiveDateTime, like: &LooseDateTime) -> LooseDateTime {
        match like {
            LooseDateTime::DateOnly(_) => LooseDateTime::DateOnly(civil.date()),
            LooseDateTime::Floating(_) => LooseDateTime::Floating(civil),
            LooseDateTime::Zoned(dt) => {
                let tz = dt.timezone();
                let resolved = match tz.from_local_datetime(&civil) {
                    LocalResult::Single(dt_in_tz) => dt_in_tz,
                    LocalResult::Ambiguous(dt1, _) => {
                        tracing::warn!(%civil, "ambiguous local time, picking earliest");
                        dt1
                    }
                    LocalResult::None => {
                        tracing::warn!(%civil, "nonexistent local time, reading as UTC");
                        tz.from_utc_datetime(&civil)
                    }
                };
                LooseDateTime::Zoned(resolved)
            }
        }
    }

    fn kind_rank(&self) -> u8 {
        match self {
            LooseDateTime::DateOnly(_) => 0,
            LooseDateTime::Floating(_) => 1,
            LooseDateTime::Zoned(_) => 2,
        }
    }
}

/// Total order. Values of the same kind compare chronologically; values of
/// different kinds compare by kind tag alone. The engine validates kind
/// homogeneity before it ever compares, so the cross-kind arm never decides
/// anything user-visible.
impl Ord for LooseDateTime {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (LooseDateTime::DateOnly(a), LooseDateTime::DateOnly(b)) => a.cmp(b),
            (LooseDateTime::Floating(a), LooseDateTime::Floating(b)) => a.cmp(b),
            (LooseDateTime::Zoned(a), LooseDateTime::Zoned(b)) => a.cmp(b),
            _ => self.kind_rank().cmp(&other.kind_rank()),
        }
    }
}

impl PartialOrd for LooseDateTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<NaiveDate> for LooseDateTime {
    fn from(d: NaiveDate) -> Self {
        LooseDateTime::DateOnly(d)
    }
}

impl From<NaiveDateTime> for LooseDateTime {
    fn from(dt: NaiveDateTime) -> Self {
        LooseDateTime::Floating(dt)
    }
}

impl From<DateTime<Tz>> for LooseDateTime {
    fn from(dt: DateTime<Tz>) -> Self {
        LooseDateTime::Zoned(dt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn datetime(y: i32, m: u32, d: u32, h: u32, mm: u32, s: u32) -> NaiveDateTime {
        date(y, m, d).and_hms_opt(h, mm, s).unwrap()
    }

    #[test]
    fn kind_matches_variant() {
        assert_eq!(
            LooseDateTime::DateOnly(date(2024, 7, 18)).kind(),
            DateTimeKind::DateOnly
        );
        assert_eq!(
            LooseDateTime::Floating(datetime(2024, 7, 18, 12, 30, 45)).kind(),
            DateTimeKind::Floating
        );
        let zoned = chrono_tz::America::New_York
            .with_ymd_and_hms(2024, 7, 18, 12, 30, 45)
            .unwrap();
        assert_eq!(LooseDateTime::Zoned(zoned).kind(), DateTimeKind::Zoned);
    }

    #[test]
    fn same_kind_values_order_chronologically() {
        let a = LooseDateTime::Floating(datetime(2024, 1, 1, 0, 0, 0));
        let b = LooseDateTime::Floating(datetime(2024, 1, 1, 0, 0, 1));
        assert!(a < b);
        assert_eq!(a.cmp(&a), Ordering::Equal);
    }

    #[test]
    fn civil_round_trip_preserves_kind() {
        let d = LooseDateTime::DateOnly(date(2016, 4, 13));
        assert_eq!(LooseDateTime::from_civil(d.to_civil(), &d), d);

        let f = LooseDateTime::Floating(datetime(2015, 11, 9, 10, 0, 0));
        assert_eq!(LooseDateTime::from_civil(f.to_civil(), &f), f);

        let z = LooseDateTime::Zoned(
            chrono_tz::Europe::Paris
                .with_ymd_and_hms(2015, 11, 9, 10, 0, 0)
                .unwrap(),
        );
        assert_eq!(LooseDateTime::from_civil(z.to_civil(), &z), z);
    }

    #[test]
    fn ambiguous_local_time_resolves_to_earliest() {
        // 2024-11-03 01:30 occurs twice in New York (DST fall back).
        let z = LooseDateTime::Zoned(
            chrono_tz::America::New_York
                .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
                .unwrap(),
        );
        let civil = datetime(2024, 11, 3, 1, 30, 0);
        let LooseDateTime::Zoned(resolved) = LooseDateTime::from_civil(civil, &z) else {
            panic!("expected zoned value");
        };
        assert_eq!(resolved.naive_local(), civil);
        // Earliest interpretation is the EDT (-04:00) reading.
        assert_eq!(resolved.offset().to_string(), "EDT");
    }
}
