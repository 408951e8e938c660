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

//! Subscriptions, priorities, and tokens.

use std::cmp::Ordering;

use promissory_core::correctness::{FAILED, check_finite_f64};
use serde::{Deserialize, Serialize};

use crate::{handler::Subscriber, topic::Topic};

/// Subscription priority. Finite, totally ordered, default 0.
///
/// Within a node, subscriptions are kept sorted by priority ascending;
/// dispatch iterates from the highest priority downward.
#[derive(Copy, Clone, Debug, Default, Serialize, Deserialize)]
pub struct Priority {
    value: f64,
}

impl Priority {
    pub const ZERO: Self = Self { value: 0.0 };

    /// Creates a new priority.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is NaN or infinite.
    pub fn new(value: f64) -> anyhow::Result<Self> {
        check_finite_f64(value, stringify!(value))?;
        Ok(Self { value })
    }

    #[must_use]
    pub const fn get(&self) -> f64 {
        self.value
    }
}

impl From<f64> for Priority {
    fn from(value: f64) -> Self {
        Self::new(value).expect(FAILED)
    }
}

impl From<i32> for Priority {
    fn from(value: i32) -> Self {
        Self {
            value: f64::from(value),
        }
    }
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.value.total_cmp(&other.value) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.total_cmp(&other.value)
    }
}

/// An opaque handle identifying a subscription or a persisted message.
///
/// Tokens are value-comparable and resolved by `(topic, id, priority)`
/// lookup; losing one is tolerable since topic-scoped operations can
/// substitute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    topic: Topic,
    id: u64,
    priority: Option<Priority>,
}

impl Token {
    pub(crate) fn subscription(topic: Topic, id: u64, priority: Priority) -> Self {
        Self {
            topic,
            id,
            priority: Some(priority),
        }
    }

    pub(crate) fn persisted(topic: Topic, id: u64) -> Self {
        Self {
            topic,
            id,
            priority: None,
        }
    }

    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn priority(&self) -> Option<Priority> {
        self.priority
    }
}

/// A subscriber registered at a topic node.
#[derive(Clone, Debug)]
pub struct Subscription {
    pub(crate) id: u64,
    pub(crate) subscriber: Subscriber,
    pub(crate) priority: Priority,
    pub(crate) suspended: bool,
}

impl Subscription {
    pub(crate) fn new(id: u64, subscriber: Subscriber, priority: Priority) -> Self {
        Self {
            id,
            subscriber,
            priority,
            suspended: false,
        }
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn priority(&self) -> Priority {
        self.priority
    }

    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub(crate) fn token(&self, topic: Topic) -> Token {
        Token::subscription(topic, self.id, self.priority)
    }
}

/// Inserts `sub` keeping the list sorted by priority ascending, ties breaking
/// by insertion order (ids increase monotonically).
pub(crate) fn insert_sorted(subs: &mut Vec<Subscription>, sub: Subscription) {
    let at = subs.partition_point(|s| s.priority <= sub.priority);
    subs.insert(at, sub);
}

/// The equal-priority run `[start, end)` for `priority`.
fn priority_run(subs: &[Subscription], priority: Priority) -> (usize, usize) {
    let start = subs.partition_point(|s| s.priority < priority);
    let end = subs.partition_point(|s| s.priority <= priority);
    (start, end)
}

/// Removes the subscription addressed by `token`. O(log n + k) where k is
/// the count at the token's priority. Not-found is `false`, never an error.
pub(crate) fn remove_by_token(subs: &mut Vec<Subscription>, token: &Token) -> bool {
    let Some(priority) = token.priority() else {
        return false;
    };
    let (start, end) = priority_run(subs, priority);
    for at in start..end {
        if subs[at].id == token.id() {
            subs.remove(at);
            return true;
        }
    }
    false
}

/// Finds the subscription addressed by `token`.
pub(crate) fn find_by_token_mut<'a>(
    subs: &'a mut [Subscription],
    token: &Token,
) -> Option<&'a mut Subscription> {
    let priority = token.priority()?;
    let (start, end) = priority_run(subs, priority);
    subs[start..end]
        .iter_mut()
        .find(|sub| sub.id == token.id())
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn sub(id: u64, priority: impl Into<Priority>) -> Subscription {
        Subscription::new(id, Subscriber::noop(), priority.into())
    }

    fn ids(subs: &[Subscription]) -> Vec<u64> {
        subs.iter().map(Subscription::id).collect()
    }

    #[rstest]
    fn test_priority_rejects_non_finite() {
        assert!(Priority::new(f64::NAN).is_err());
        assert!(Priority::new(f64::INFINITY).is_err());
        assert!(Priority::new(-2.5).is_ok());
    }

    #[rstest]
    fn test_insert_sorted_ascending_with_stable_ties() {
        let mut subs = Vec::new();
        insert_sorted(&mut subs, sub(1, 5));
        insert_sorted(&mut subs, sub(2, 0));
        insert_sorted(&mut subs, sub(3, 5));
        insert_sorted(&mut subs, sub(4, -1));
        insert_sorted(&mut subs, sub(5, 5));

        assert_eq!(ids(&subs), vec![4, 2, 1, 3, 5]);
    }

    #[rstest]
    fn test_remove_by_token() {
        let mut subs = Vec::new();
        for (id, priority) in [(1, 0), (2, 1), (3, 1), (4, 1), (5, 2)] {
            insert_sorted(&mut subs, sub(id, priority));
        }
        let topic = Topic::new("a");

        assert!(remove_by_token(&mut subs, &sub(3, 1).token(topic)));
        assert_eq!(ids(&subs), vec![1, 2, 4, 5]);

        // Same token again: already gone
        assert!(!remove_by_token(&mut subs, &sub(3, 1).token(topic)));

        // Right id, wrong priority anchor
        assert!(!remove_by_token(&mut subs, &sub(2, 7).token(topic)));

        // Persisted tokens never address subscriptions
        assert!(!remove_by_token(&mut subs, &Token::persisted(topic, 2)));
    }

    #[rstest]
    fn test_find_by_token_mut_flips_suspension() {
        let mut subs = Vec::new();
        for (id, priority) in [(1, 0), (2, 0), (3, 1)] {
            insert_sorted(&mut subs, sub(id, priority));
        }
        let token = sub(2, 0).token(Topic::new("a"));

        find_by_token_mut(&mut subs, &token).unwrap().suspended = true;
        assert!(subs.iter().find(|s| s.id == 2).unwrap().is_suspended());
        assert!(!subs.iter().find(|s| s.id == 1).unwrap().is_suspended());
    }

    #[rstest]
    fn test_token_round_trips_through_serde() {
        let token = Token::subscription(Topic::new("a.b"), 9, Priority::from(2));
        let json = serde_json::to_string(&token).unwrap();
        let decoded: Token = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, token);
    }

    #[rstest]
    fn test_fractional_and_negative_priorities_order() {
        let mut subs = Vec::new();
        insert_sorted(&mut subs, sub(1, 0.5));
        insert_sorted(&mut subs, sub(2, -0.5));
        insert_sorted(&mut subs, sub(3, 0.25));
        assert_eq!(ids(&subs), vec![2, 3, 1]);
    }
}
