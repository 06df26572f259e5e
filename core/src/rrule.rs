// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

mod byrule;
mod frequency;
mod rule;

pub use byrule::{ByRule, ByRuleKind, ByWeekday};
pub use frequency::Frequency;
pub use rule::{Bound, RecurrenceRule, RecurrenceRuleBuilder};
