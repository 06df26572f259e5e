// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::datetime::DateTimeKind;
use crate::rrule::{ByRuleKind, Frequency};

/// Error type for recurrence set computation.
///
/// Every variant reflects a caller contract violation: the engine is a pure
/// computation with no I/O, so there is no transient or retryable tier.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecurrenceError {
    /// A temporal value has a concrete kind incompatible with the anchor.
    ///
    /// Mixing date-only, floating and zoned values in one recurrence input
    /// set is never silently coerced.
    #[error("{context}: expected a {expected} value, got {got}")]
    KindMismatch {
        /// Which input carried the offending value (e.g. `"EXDATE"`)
        context: &'static str,
        /// The anchor's kind
        expected: DateTimeKind,
        /// The offending value's kind
        got: DateTimeKind,
    },

    /// INTERVAL below the minimum of 1.
    #[error("INTERVAL must be at least 1, got {interval}")]
    InvalidInterval {
        /// The rejected interval
        interval: u32,
    },

    /// The same BYxxx rule kind was added more than once.
    #[error("{kind} specified more than once")]
    DuplicateByRule {
        /// The duplicated rule kind
        kind: ByRuleKind,
    },

    /// A BYxxx rule with no values; the grammar requires at least one.
    #[error("{kind} requires at least one value")]
    EmptyByRule {
        /// The rule kind missing its values
        kind: ByRuleKind,
    },

    /// A BYxxx value outside the range the grammar allows.
    #[error("{kind} value {value} is out of range")]
    InvalidByRuleValue {
        /// The rule kind carrying the value
        kind: ByRuleKind,
        /// The rejected value
        value: i64,
    },

    /// A frequency this engine does not step over (sub-daily units).
    #[error("unsupported frequency: {frequency}")]
    UnsupportedFrequency {
        /// The rejected frequency
        frequency: Frequency,
    },

    /// A BYxxx rule applied at a granularity the engine does not support.
    #[error("{kind} is not supported {reason}")]
    UnsupportedByRule {
        /// The rule kind
        kind: ByRuleKind,
        /// Why the combination is rejected
        reason: &'static str,
    },
}
