// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use cadence_core::LooseDateTime;
use chrono::{NaiveDate, NaiveDateTime};

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn ymd_hm(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
    ymd(y, m, d).and_hms_opt(h, min, 0).unwrap()
}

pub fn floating(y: i32, m: u32, d: u32, h: u32, min: u32) -> LooseDateTime {
    LooseDateTime::from(ymd_hm(y, m, d, h, min))
}

pub fn date_only(y: i32, m: u32, d: u32) -> LooseDateTime {
    LooseDateTime::from(ymd(y, m, d))
}
