// SPDX-FileCopyrightText: 2025 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::cmp::Ordering;
use std::iter::Peekable;

/// Merges two sequences already sorted under `cmp` into one sorted sequence.
///
/// When both sides hold an equal element, the left one is emitted and the
/// right one is dropped, so merging a rule stream with its own anchor or an
/// overlapping inclusion list never duplicates a value.
pub(crate) struct MergedIter<T, L, R, F>
where
    L: Iterator<Item = T>,
    R: Iterator<Item = T>,
    F: Fn(&T, &T) -> Ordering,
{
    left: Peekable<L>,
    right: Peekable<R>,
    cmp: F,
}

impl<T, L, R, F> MergedIter<T, L, R, F>
where
    L: Iterator<Item = T>,
    R: Iterator<Item = T>,
    F: Fn(&T, &T) -> Ordering,
{
    pub(crate) fn new(left: L, right: R, cmp: F) -> Self {
        Self {
            left: left.peekable(),
            right: right.peekable(),
            cmp,
        }
    }
}

impl<T, L, R, F> Iterator for MergedIter<T, L, R, F>
where
    L: Iterator<Item = T>,
    R: Iterator<Item = T>,
    F: Fn(&T, &T) -> Ordering,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match (self.left.peek(), self.right.peek()) {
            (Some(l), Some(r)) => match (self.cmp)(l, r) {
                Ordering::Less => self.left.next(),
                Ordering::Greater => self.right.next(),
                Ordering::Equal => {
                    self.right.next();
                    self.left.next()
                }
            },
            (Some(_), None) => self.left.next(),
            (None, _) => self.right.next(),
        }
    }
}
