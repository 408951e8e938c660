// -------------------------------------------------------------------------------------------------
//  Copyright (C) 2015-2026 Nautech Systems Pty Ltd. All rights reserved.
//  https://nautechsystems.io
//
//  Licensed under the GNU Lesser General Public License Version 3.0 (the "License");
//  You may not use this file except in compliance with the License.
//  You may obtain a copy of the License at https://www.gnu.org/licenses/lgpl-3.0.en.html
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.
// -------------------------------------------------------------------------------------------------

//! K-way merge over sorted sources.
//!
//! Used twice by the broker: merging persisted messages from descendant nodes
//! in creation order for late delivery, and merging subscription lists from
//! ancestor nodes in priority order for dispatch.

use std::{cmp::Ordering, iter::Peekable, ops::Range};

use crate::subscription::{Priority, Subscription};

/// Merges already-sorted sources into one sorted stream by a projected key.
///
/// One cursor per source; each emission takes the source whose head projects
/// to the smallest key, ties breaking toward the earliest source. An
/// exhausted source compares as infinity.
pub struct KWayMerge<I, K, F>
where
    I: Iterator,
    K: Ord,
    F: Fn(&I::Item) -> K,
{
    sources: Vec<Peekable<I>>,
    key: F,
}

impl<I, K, F> KWayMerge<I, K, F>
where
    I: Iterator,
    K: Ord,
    F: Fn(&I::Item) -> K,
{
    /// Creates a merge over `sources`, each of which must already be sorted
    /// by the projected key.
    pub fn new<S>(sources: S, key: F) -> Self
    where
        S: IntoIterator<Item = I>,
    {
        Self {
            sources: sources.into_iter().map(Iterator::peekable).collect(),
            key,
        }
    }
}

impl<I, K, F> Iterator for KWayMerge<I, K, F>
where
    I: Iterator,
    K: Ord,
    F: Fn(&I::Item) -> K,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let mut best: Option<(usize, K)> = None;
        for (at, source) in self.sources.iter_mut().enumerate() {
            if let Some(item) = source.peek() {
                let key = (self.key)(item);
                let better = match &best {
                    Some((_, best_key)) => key < *best_key,
                    None => true,
                };
                if better {
                    best = Some((at, key));
                }
            }
        }
        let (at, _) = best?;
        self.sources[at].next()
    }
}

/// Merge key for dispatch-list construction: priority descending, then
/// registration (id) order ascending.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct DispatchKey {
    priority: Priority,
    id: u64,
}

impl DispatchKey {
    pub(crate) fn of(sub: &Subscription) -> Self {
        Self {
            priority: sub.priority,
            id: sub.id,
        }
    }
}

impl PartialOrd for DispatchKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DispatchKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| self.id.cmp(&other.id))
    }
}

/// Iterates a priority-ascending subscription list in dispatch order:
/// priority descending across runs, registration (id) order inside each
/// equal-priority run.
pub(crate) struct DispatchOrder<'a> {
    subs: &'a [Subscription],
    run: Range<usize>,
    upper: usize,
}

impl<'a> DispatchOrder<'a> {
    pub(crate) fn new(subs: &'a [Subscription]) -> Self {
        Self {
            subs,
            run: 0..0,
            upper: subs.len(),
        }
    }
}

impl<'a> Iterator for DispatchOrder<'a> {
    type Item = &'a Subscription;

    fn next(&mut self) -> Option<Self::Item> {
        if self.run.is_empty() {
            if self.upper == 0 {
                return None;
            }
            let priority = self.subs[self.upper - 1].priority;
            let start = self.subs[..self.upper].partition_point(|s| s.priority < priority);
            self.run = start..self.upper;
            self.upper = start;
        }
        let at = self.run.start;
        self.run.start += 1;
        Some(&self.subs[at])
    }
}
