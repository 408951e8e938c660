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

//! Retained publications and their replay bookkeeping.
//!
//! A publish with `persist` appends the message to its topic node; late
//! subscribers to any ancestor receive the retained messages of their
//! subtree, merged back into global creation order.

use crate::{
    merge::KWayMerge,
    message::Payload,
    subscription::Token,
    topic::Topic,
    tree::TopicTree,
};

/// A retained publication, replayed to later subscribers whose topic is an
/// ancestor of the publication's topic.
#[derive(Clone, Debug)]
pub struct PersistedMessage {
    pub(crate) topic: Topic,
    pub(crate) data: Payload,
    pub(crate) order: u64,
}

impl PersistedMessage {
    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    #[must_use]
    pub fn data(&self) -> Payload {
        self.data.clone()
    }

    #[must_use]
    pub fn order(&self) -> u64 {
        self.order
    }
}

impl TopicTree {
    /// Appends a retained message to its topic node, materializing the node
    /// if absent. Orders are broker-monotonic, so appending keeps the list
    /// sorted.
    pub(crate) fn append_persisted(&mut self, topic: Topic, data: Payload, order: u64) {
        let node = self.materialize(topic);
        debug_assert!(node.persisted.last().is_none_or(|m| m.order < order));
        node.persisted.push(PersistedMessage { topic, data, order });
    }

    /// Removes the single persisted message addressed by `token`. The token
    /// topic must match the node exactly; the message is located by binary
    /// search on its order.
    pub(crate) fn remove_persisted_by_token(&mut self, token: &Token) -> bool {
        let Some(node) = self.find_node_mut(token.topic()) else {
            return false;
        };
        match node
            .persisted
            .binary_search_by_key(&token.id(), PersistedMessage::order)
        {
            Ok(at) => {
                node.persisted.remove(at);
                true
            }
            Err(_) => false,
        }
    }

    /// Clears persisted messages on `topic`'s node and every descendant.
    /// Ancestors and siblings are untouched. Returns whether any message was
    /// removed.
    pub(crate) fn clear_persisted_subtree(&mut self, topic: Topic) -> bool {
        let Some(node) = self.find_node_mut(topic) else {
            return false;
        };
        let mut removed = 0_usize;
        node.for_each_mut(&mut |n| {
            removed += n.persisted.len();
            n.persisted.clear();
        });
        removed > 0
    }

    /// Empties every persisted list in the tree.
    pub(crate) fn clear_all_persisted(&mut self) -> bool {
        self.clear_persisted_subtree(Topic::root())
    }

    /// Persisted messages of `topic`'s subtree, merged by creation order.
    pub(crate) fn collect_persisted(&self, topic: Topic) -> Vec<PersistedMessage> {
        let Some(node) = self.find_node(topic) else {
            return Vec::new();
        };
        let sources: Vec<_> = node
            .descendants()
            .into_iter()
            .map(|n| n.persisted.iter())
            .collect();
        KWayMerge::new(sources, |m: &&PersistedMessage| m.order)
            .cloned()
            .collect()
    }

    /// Total persisted messages in `topic`'s subtree.
    pub(crate) fn persisted_count(&self, topic: Topic) -> usize {
        self.find_node(topic).map_or(0, |node| {
            node.descendants().iter().map(|n| n.persisted.len()).sum()
        })
    }
}
