// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Cadence: an RFC 5545 recurrence set engine.
//!
//! The recurrence set is the complete set of occurrence instants for a
//! repeating calendar component (RFC 5545, 3.8.5.2). It is derived from the
//! anchor instant (`DTSTART`), an optional recurrence rule (`RRULE`), an
//! explicit inclusion list (`RDATE`) and an explicit exclusion list
//! (`EXDATE`). This crate computes that set lazily, as an ascending,
//! duplicate-free iterator that can be re-invoked from any start instant.

mod datetime;
mod error;
mod recurrence;
mod rrule;

pub use crate::datetime::{DateTimeKind, LooseDateTime};
pub use crate::error::RecurrenceError;
pub use crate::recurrence::{Occurrences, Recurrence, SeekCache};
pub use crate::rrule::{
    Bound, ByRule, ByRuleKind, ByWeekday, Frequency, RecurrenceRule, RecurrenceRuleBuilder,
};
