// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

mod cache;
mod merge;
mod streamer;

pub use cache::SeekCache;
pub use streamer::{Occurrences, Recurrence};
