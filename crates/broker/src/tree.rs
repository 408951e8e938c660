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

//! Hierarchical topic node storage.
//!
//! Exactly one node exists per materialized topic. Nodes own their children
//! (sorted by topic), their subscriptions (sorted by priority), and their
//! persisted messages (sorted by order); lineage is recomputed on demand so
//! no parent pointers are needed. Intermediate nodes are created when
//! subscribing or persisting to a deep topic and are never pruned.

use crate::{persist::PersistedMessage, subscription::Subscription, topic::Topic};

/// A node in the topic tree.
#[derive(Debug)]
pub struct TopicNode {
    topic: Topic,
    children: Vec<TopicNode>,
    pub(crate) subscriptions: Vec<Subscription>,
    pub(crate) persisted: Vec<PersistedMessage>,
}

impl TopicNode {
    fn new(topic: Topic) -> Self {
        Self {
            topic,
            children: Vec::new(),
            subscriptions: Vec::new(),
            persisted: Vec::new(),
        }
    }

    #[must_use]
    pub fn topic(&self) -> Topic {
        self.topic
    }

    #[must_use]
    pub fn children(&self) -> &[TopicNode] {
        &self.children
    }

    #[must_use]
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }

    #[must_use]
    pub fn persisted(&self) -> &[PersistedMessage] {
        &self.persisted
    }

    /// Pre-order traversal: the node itself, then each child subtree in
    /// child (lexicographic) order.
    #[must_use]
    pub fn descendants(&self) -> Vec<&TopicNode> {
        let mut nodes = Vec::new();
        self.collect(&mut nodes);
        nodes
    }

    fn collect<'a>(&'a self, nodes: &mut Vec<&'a TopicNode>) {
        nodes.push(self);
        for child in &self.children {
            child.collect(nodes);
        }
    }

    /// Applies `f` to this node and every descendant, pre-order.
    pub(crate) fn for_each_mut(&mut self, f: &mut impl FnMut(&mut TopicNode)) {
        f(self);
        for child in &mut self.children {
            child.for_each_mut(f);
        }
    }

    fn child_index(&self, topic: &str) -> Result<usize, usize> {
        self.children
            .binary_search_by(|child| child.topic.as_str().cmp(topic))
    }
}

/// The broker's topic tree. Contains the root node at all times.
#[derive(Debug)]
pub struct TopicTree {
    root: TopicNode,
}

impl TopicTree {
    /// Creates a new tree holding only the root node.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: TopicNode::new(Topic::root()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &TopicNode {
        &self.root
    }

    /// Returns the deepest existing node whose topic is `topic` itself or a
    /// dotted prefix of it. Descends generation by generation, locating each
    /// candidate child by binary search, until no matching child exists.
    #[must_use]
    pub fn ancestor_search(&self, topic: Topic) -> &TopicNode {
        let mut node = &self.root;
        for prefix in topic.prefixes() {
            if prefix == node.topic.as_str() {
                continue;
            }
            match node.child_index(prefix) {
                Ok(at) => node = &node.children[at],
                Err(_) => break,
            }
        }
        node
    }

    /// Returns the node for exactly `topic`, if materialized.
    #[must_use]
    pub fn find_node(&self, topic: Topic) -> Option<&TopicNode> {
        let node = self.ancestor_search(topic);
        (node.topic == topic).then_some(node)
    }

    pub(crate) fn find_node_mut(&mut self, topic: Topic) -> Option<&mut TopicNode> {
        let mut node = &mut self.root;
        for prefix in topic.prefixes() {
            if prefix == node.topic.as_str() {
                continue;
            }
            match node.child_index(prefix) {
                Ok(at) => node = &mut node.children[at],
                Err(_) => return None,
            }
        }
        Some(node)
    }

    /// Materializes the line of nodes from the deepest existing ancestor
    /// down to `topic`, sorted-inserting each into its parent's children.
    /// Returns the terminal node. Idempotent if the terminal already exists.
    pub(crate) fn materialize(&mut self, topic: Topic) -> &mut TopicNode {
        let mut node = &mut self.root;
        for prefix in topic.prefixes() {
            if prefix == node.topic.as_str() {
                continue;
            }
            let at = match node.child_index(prefix) {
                Ok(at) => at,
                Err(at) => {
                    node.children.insert(at, TopicNode::new(Topic::new(prefix)));
                    at
                }
            };
            node = &mut node.children[at];
        }
        node
    }

    /// Returns the ordered sequence of existing nodes from the root down to
    /// the deepest ancestor of `topic`, inclusive. The last element may be
    /// `topic` itself or a proper ancestor.
    #[must_use]
    pub fn lineage(&self, topic: Topic) -> Vec<&TopicNode> {
        let mut nodes = vec![&self.root];
        let mut node = &self.root;
        for prefix in topic.prefixes() {
            if prefix == node.topic.as_str() {
                continue;
            }
            match node.child_index(prefix) {
                Ok(at) => {
                    node = &node.children[at];
                    nodes.push(node);
                }
                Err(_) => break,
            }
        }
        nodes
    }
}

impl Default for TopicTree {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn tree_with(topics: &[&str]) -> TopicTree {
        let mut tree = TopicTree::new();
        for topic in topics {
            tree.materialize(Topic::new(topic));
        }
        tree
    }

    fn topics_of(nodes: &[&TopicNode]) -> Vec<String> {
        nodes.iter().map(|n| n.topic().as_str().to_string()).collect()
    }

    #[rstest]
    fn test_new_contains_root() {
        let tree = TopicTree::new();
        assert!(tree.root().topic().is_root());
        assert!(tree.root().children().is_empty());
    }

    #[rstest]
    fn test_materialize_creates_intermediates() {
        let tree = tree_with(&["a.b.c"]);
        let lineage = tree.lineage(Topic::new("a.b.c"));
        assert_eq!(topics_of(&lineage), vec!["", "a", "a.b", "a.b.c"]);
    }

    #[rstest]
    fn test_materialize_is_idempotent() {
        let mut tree = tree_with(&["a.b"]);
        tree.materialize(Topic::new("a.b"));
        let root_children = tree.root().children();
        assert_eq!(root_children.len(), 1);
        assert_eq!(root_children[0].children().len(), 1);
    }

    #[rstest]
    fn test_children_sorted_lexicographically() {
        let tree = tree_with(&["b", "a.x", "a", "c", "a.m"]);
        let names: Vec<String> = tree.root().children().iter().map(|n| n.topic().as_str().to_string()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let a = tree.find_node(Topic::new("a")).unwrap();
        let names: Vec<String> = a.children().iter().map(|n| n.topic().as_str().to_string()).collect();
        assert_eq!(names, vec!["a.m", "a.x"]);
    }

    #[rstest]
    #[case(&["a", "a.b"], "a.b.c", "a.b")]
    #[case(&["a", "a.b"], "a.b", "a.b")]
    #[case(&["a"], "ab", "")]
    #[case(&["a"], "a.x", "a")]
    #[case(&["a.b"], "x.y", "")]
    #[case(&["a", "a."], "a..b", "a.")]
    fn test_ancestor_search(
        #[case] topics: &[&str],
        #[case] target: &str,
        #[case] expected: &str,
    ) {
        let tree = tree_with(topics);
        let found = tree.ancestor_search(Topic::new(target));
        assert_eq!(found.topic().as_str(), expected);
    }

    #[rstest]
    fn test_dotted_variants_are_distinct_nodes() {
        let tree = tree_with(&["a", "a."]);
        assert!(tree.find_node(Topic::new("a")).is_some());
        assert!(tree.find_node(Topic::new("a.")).is_some());
        assert!(tree.find_node(Topic::new("a.b")).is_none());
    }

    #[rstest]
    fn test_leading_dot_topic_hangs_off_root() {
        let tree = tree_with(&[".x"]);
        let lineage = tree.lineage(Topic::new(".x"));
        assert_eq!(topics_of(&lineage), vec!["", ".x"]);
    }

    #[rstest]
    fn test_find_node_requires_exact_topic() {
        let tree = tree_with(&["a.b"]);
        assert!(tree.find_node(Topic::new("a")).is_some());
        assert!(tree.find_node(Topic::new("a.b")).is_some());
        assert!(tree.find_node(Topic::new("a.b.c")).is_none());
    }

    #[rstest]
    fn test_lineage_for_root() {
        let tree = tree_with(&["a"]);
        let lineage = tree.lineage(Topic::root());
        assert_eq!(topics_of(&lineage), vec![""]);
    }

    #[rstest]
    fn test_descendants_pre_order() {
        let tree = tree_with(&["a.b", "a.c", "b"]);
        let names = topics_of(&tree.root().descendants());
        assert_eq!(names, vec!["", "a", "a.b", "a.c", "b"]);

        let a = tree.find_node(Topic::new("a")).unwrap();
        assert_eq!(topics_of(&a.descendants()), vec!["a", "a.b", "a.c"]);
    }

    fn assert_sorted_everywhere(node: &TopicNode) {
        let names: Vec<String> = node.children().iter().map(|n| n.topic().as_str().to_string()).collect();
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
        for child in node.children() {
            assert_sorted_everywhere(child);
        }
    }

    fn topic_strategy() -> impl Strategy<Value = String> {
        prop::collection::vec("[a-c]{1,2}", 1..4).prop_map(|segments| segments.join("."))
    }

    proptest! {
        #[rstest]
        fn prop_materialize_keeps_children_sorted(topics in prop::collection::vec(topic_strategy(), 0..25)) {
            let mut tree = TopicTree::new();
            for topic in &topics {
                tree.materialize(Topic::new(topic));
            }
            assert_sorted_everywhere(tree.root());
        }

        #[rstest]
        fn prop_lineage_is_ancestor_chain(topics in prop::collection::vec(topic_strategy(), 1..25)) {
            let mut tree = TopicTree::new();
            for topic in &topics {
                tree.materialize(Topic::new(topic));
            }
            let target = Topic::new(&topics[0]);
            let lineage = tree.lineage(target);
            prop_assert!(lineage[0].topic().is_root());
            for pair in lineage.windows(2) {
                prop_assert!(pair[0].topic().is_ancestor_of(pair[1].topic()));
            }
            prop_assert_eq!(lineage.last().unwrap().topic(), target);
        }
    }
}
