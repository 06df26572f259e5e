// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

mod loose;
mod weekdate;

pub use loose::{DateTimeKind, LooseDateTime};
pub(crate) use weekdate::{
    date_of_week, days_in_month, days_in_year, first_of_week, weekday_offset, weeks_in_year,
};
