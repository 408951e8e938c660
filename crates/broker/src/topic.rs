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

//! Topic strings and topic expressions.
//!
//! A topic is a string partitioned by `.` into generations. The empty string
//! is the root of the hierarchy and an ancestor of every other topic. Topics
//! are not normalized: `"a."` and `"a"` are distinct, and leading dots are
//! preserved.

use std::{
    cmp::Ordering,
    fmt::{self, Display},
};

use serde::{Deserialize, Serialize};
use ustr::Ustr;

/// A dotted topic name identifying a subject and its place in the hierarchy.
///
/// Topics are interned; copies are cheap and equality is a pointer compare.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic {
    value: Ustr,
}

impl Topic {
    /// Creates a new topic from a string.
    pub fn new<T: AsRef<str>>(value: T) -> Self {
        Self {
            value: Ustr::from(value.as_ref()),
        }
    }

    /// Returns the root topic (the empty string).
    #[must_use]
    pub fn root() -> Self {
        Self::new("")
    }

    /// Returns the topic as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.value.as_str()
    }

    /// Returns whether this is the root topic.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.value.is_empty()
    }

    /// Iterates the generation joins from the first generation to the full
    /// topic: `"a.b.c"` yields `"a"`, `"a.b"`, `"a.b.c"`. The root yields
    /// nothing.
    pub fn prefixes(self) -> impl Iterator<Item = &'static str> {
        let value: &'static str = self.value.as_str();
        let partial = value.match_indices('.').map(move |(at, _)| &value[..at]);
        partial.chain((!value.is_empty()).then_some(value))
    }

    /// Returns whether `self` is `other` itself or a proper dotted prefix of
    /// it. The root is an ancestor of everything.
    #[must_use]
    pub fn is_ancestor_of(&self, other: Topic) -> bool {
        if self.is_root() {
            return true;
        }
        let ancestor = self.as_str();
        let topic = other.as_str();
        topic == ancestor
            || (topic.len() > ancestor.len()
                && topic.starts_with(ancestor)
                && topic.as_bytes()[ancestor.len()] == b'.')
    }
}

// Interned string ordering follows pointer identity; topics must order by
// their text so that tree children stay lexicographically sorted.
impl PartialOrd for Topic {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Topic {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl Default for Topic {
    fn default() -> Self {
        Self::root()
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl From<&str> for Topic {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Topic {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&String> for Topic {
    fn from(value: &String) -> Self {
        Self::new(value)
    }
}

impl From<Ustr> for Topic {
    fn from(value: Ustr) -> Self {
        Self { value }
    }
}

/// A topic expression: a single topic, a sequence of topics, or a string of
/// topics separated by commas with optional surrounding whitespace.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TopicExpr {
    topics: Vec<Topic>,
}

impl TopicExpr {
    /// Returns the expanded topics in expression order.
    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    /// Consumes the expression, returning the expanded topics.
    #[must_use]
    pub fn into_topics(self) -> Vec<Topic> {
        self.topics
    }

    /// Returns the number of topics in the expression.
    #[must_use]
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Returns whether the expression holds no topics.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

impl From<&str> for TopicExpr {
    fn from(value: &str) -> Self {
        Self {
            topics: value.split(',').map(|s| Topic::new(s.trim())).collect(),
        }
    }
}

impl From<String> for TopicExpr {
    fn from(value: String) -> Self {
        value.as_str().into()
    }
}

impl From<Topic> for TopicExpr {
    fn from(value: Topic) -> Self {
        Self {
            topics: vec![value],
        }
    }
}

impl From<Vec<Topic>> for TopicExpr {
    fn from(topics: Vec<Topic>) -> Self {
        Self { topics }
    }
}

impl From<&[Topic]> for TopicExpr {
    fn from(topics: &[Topic]) -> Self {
        Self {
            topics: topics.to_vec(),
        }
    }
}

impl From<&[&str]> for TopicExpr {
    fn from(topics: &[&str]) -> Self {
        Self {
            topics: topics.iter().map(Topic::new).collect(),
        }
    }
}

impl<const N: usize> From<[&str; N]> for TopicExpr {
    fn from(topics: [&str; N]) -> Self {
        topics.as_slice().into()
    }
}

impl FromIterator<Topic> for TopicExpr {
    fn from_iter<I: IntoIterator<Item = Topic>>(iter: I) -> Self {
        Self {
            topics: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for TopicExpr {
    type Item = Topic;
    type IntoIter = std::vec::IntoIter<Topic>;

    fn into_iter(self) -> Self::IntoIter {
        self.topics.into_iter()
    }
}
