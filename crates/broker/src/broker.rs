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

//! Broker instances and the operation façade.
//!
//! An [`Arbiter`] is a cheap cloneable handle over one broker's state (topic
//! tree, id generator, default options). Brokers are independent: neither
//! subscriptions nor persisted messages nor the id space cross instances.
//! Handles stay valid when extracted from their broker; every operation
//! works through the state captured at construction time.

use std::{
    cell::RefCell,
    fmt::{self, Debug},
    rc::Rc,
};

use futures::task::LocalSpawn;
use promissory_core::UUID4;

use crate::{
    dispatch,
    handler::Subscriber,
    ids::IdGenerator,
    message::Payload,
    options::{Options, PublishOptions, SubscribeOptions},
    persist::PersistedMessage,
    resolver::Publication,
    runtime::Scheduler,
    subscription::{self, Subscription, Token},
    topic::{Topic, TopicExpr},
    tree::{TopicNode, TopicTree},
};

#[derive(Debug)]
pub(crate) struct ArbiterCore {
    pub(crate) tree: TopicTree,
    pub(crate) ids: IdGenerator,
    pub(crate) options: Options,
    pub(crate) instance_id: UUID4,
}

impl ArbiterCore {
    fn new(options: Options) -> Self {
        Self {
            tree: TopicTree::new(),
            ids: IdGenerator::new(),
            options,
            instance_id: UUID4::new(),
        }
    }
}

/// An independent publish/subscribe broker.
#[derive(Clone)]
pub struct Arbiter {
    core: Rc<RefCell<ArbiterCore>>,
    scheduler: Scheduler,
}

impl Arbiter {
    /// Creates a broker driven by `spawner`, with default options.
    pub fn new(spawner: impl LocalSpawn + 'static) -> Self {
        Self::with_options(spawner, Options::default())
    }

    /// Creates a broker driven by `spawner`, with the given default options.
    pub fn with_options(spawner: impl LocalSpawn + 'static, options: Options) -> Self {
        Self::from_scheduler(Scheduler::new(spawner), options)
    }

    fn from_scheduler(scheduler: Scheduler, options: Options) -> Self {
        Self {
            core: Rc::new(RefCell::new(ArbiterCore::new(options))),
            scheduler,
        }
    }

    /// Returns a fresh broker sharing this broker's executor and nothing
    /// else: a separate tree, separate default options, a separate id space.
    #[must_use]
    pub fn create(&self) -> Self {
        Self::from_scheduler(self.scheduler.clone(), Options::default())
    }

    /// The broker's instance identifier.
    #[must_use]
    pub fn instance_id(&self) -> UUID4 {
        self.core.borrow().instance_id
    }

    /// A copy of the broker's current default options.
    #[must_use]
    pub fn options(&self) -> Options {
        self.core.borrow().options
    }

    /// Mutates the broker's default options; affects subsequent operations.
    pub fn update_options(&self, f: impl FnOnce(&mut Options)) {
        f(&mut self.core.borrow_mut().options);
    }

    /// Subscribes `subscriber` to every topic in the expression, returning
    /// one token per topic in expression order.
    ///
    /// Unless `ignore_persisted`, retained messages of each subscribed
    /// subtree are replayed to the new subscriber in creation order: inline
    /// when the effective `sync` is true, otherwise on a later turn.
    pub fn subscribe(
        &self,
        topics: impl Into<TopicExpr>,
        subscriber: Subscriber,
        options: Option<SubscribeOptions>,
    ) -> Vec<Token> {
        let merged = options.unwrap_or_default().merged_into(self.options());
        topics
            .into()
            .into_iter()
            .map(|topic| self.subscribe_topic(topic, subscriber.clone(), merged))
            .collect()
    }

    fn subscribe_topic(&self, topic: Topic, subscriber: Subscriber, options: Options) -> Token {
        let (token, replay) = {
            let mut core = self.core.borrow_mut();
            let id = core.ids.generate();
            let sub = Subscription::new(id, subscriber.clone(), options.priority);
            let token = sub.token(topic);

            let node = core.tree.materialize(topic);
            subscription::insert_sorted(&mut node.subscriptions, sub);
            log::debug!(
                "Subscribed to '{topic}' with id {id} (priority {})",
                options.priority.get()
            );

            let replay = if options.ignore_persisted {
                Vec::new()
            } else {
                core.tree.collect_persisted(topic)
            };
            (token, replay)
        };

        if !replay.is_empty() {
            if options.sync {
                replay_to(&self.scheduler, &subscriber, replay);
            } else {
                let scheduler = self.scheduler.clone();
                self.scheduler.defer(move || {
                    replay_to(&scheduler, &subscriber, replay);
                });
            }
        }

        token
    }

    /// Publishes `data` to a single topic, returning the publication future.
    pub fn publish(
        &self,
        topic: impl Into<Topic>,
        data: Payload,
        options: Option<PublishOptions>,
    ) -> Publication {
        let merged = options.unwrap_or_default().merged_into(self.options());
        dispatch::publish(&self.core, &self.scheduler, topic.into(), data, merged)
    }

    /// Removes the subscription addressed by `token`. Returns whether it was
    /// found.
    pub fn unsubscribe(&self, token: &Token) -> bool {
        let mut core = self.core.borrow_mut();
        let Some(node) = core.tree.find_node_mut(token.topic()) else {
            return false;
        };
        let removed = subscription::remove_by_token(&mut node.subscriptions, token);
        if removed {
            log::debug!("Unsubscribed id {} from '{}'", token.id(), token.topic());
        } else {
            log::debug!("No subscription id {} at '{}'", token.id(), token.topic());
        }
        removed
    }

    /// Suspends the subscription addressed by `token` without removing it.
    pub fn suspend(&self, token: &Token) -> bool {
        self.set_suspended(token, true)
    }

    /// Reactivates the subscription addressed by `token`.
    pub fn resubscribe(&self, token: &Token) -> bool {
        self.set_suspended(token, false)
    }

    fn set_suspended(&self, token: &Token, suspended: bool) -> bool {
        let mut core = self.core.borrow_mut();
        let Some(node) = core.tree.find_node_mut(token.topic()) else {
            return false;
        };
        match subscription::find_by_token_mut(&mut node.subscriptions, token) {
            Some(sub) => {
                sub.suspended = suspended;
                true
            }
            None => false,
        }
    }

    /// Removes every subscription on each topic and its descendants.
    /// Returns, per topic, whether any subscription was removed.
    pub fn unsubscribe_topics(&self, topics: impl Into<TopicExpr>) -> Vec<bool> {
        self.sweep(topics, |node| {
            let removed = node.subscriptions.len();
            node.subscriptions.clear();
            removed
        })
    }

    /// Suspends every subscription on each topic and its descendants.
    /// Returns, per topic, whether any subscription changed state.
    pub fn suspend_topics(&self, topics: impl Into<TopicExpr>) -> Vec<bool> {
        self.sweep(topics, |node| set_all_suspended(node, true))
    }

    /// Reactivates every subscription on each topic and its descendants.
    /// Returns, per topic, whether any subscription changed state.
    pub fn resubscribe_topics(&self, topics: impl Into<TopicExpr>) -> Vec<bool> {
        self.sweep(topics, |node| set_all_suspended(node, false))
    }

    fn sweep(
        &self,
        topics: impl Into<TopicExpr>,
        mut apply: impl FnMut(&mut TopicNode) -> usize,
    ) -> Vec<bool> {
        let mut core = self.core.borrow_mut();
        topics
            .into()
            .into_iter()
            .map(|topic| {
                let Some(node) = core.tree.find_node_mut(topic) else {
                    return false;
                };
                let mut changed = 0_usize;
                node.for_each_mut(&mut |n| changed += apply(n));
                changed > 0
            })
            .collect()
    }

    /// Removes the persisted message addressed by `token`.
    pub fn remove_persisted(&self, token: &Token) -> bool {
        self.core.borrow_mut().tree.remove_persisted_by_token(token)
    }

    /// Removes the persisted message belonging to a persisted publication.
    pub fn remove_persisted_publication(&self, publication: &Publication) -> bool {
        publication
            .token()
            .is_some_and(|token| self.remove_persisted(&token))
    }

    /// Clears persisted messages on each topic and its descendants.
    /// Ancestors and siblings are never affected. Returns, per topic,
    /// whether any message was removed.
    pub fn remove_persisted_topics(&self, topics: impl Into<TopicExpr>) -> Vec<bool> {
        let mut core = self.core.borrow_mut();
        topics
            .into()
            .into_iter()
            .map(|topic| core.tree.clear_persisted_subtree(topic))
            .collect()
    }

    /// Empties every persisted list in the broker. Returns whether any
    /// message was removed.
    pub fn clear_persisted(&self) -> bool {
        self.core.borrow_mut().tree.clear_all_persisted()
    }

    /// Count of active (non-suspended) subscriptions a publish to `topic`
    /// would notify.
    #[must_use]
    pub fn subscriptions_count(&self, topic: impl Into<Topic>) -> usize {
        let core = self.core.borrow();
        core.tree
            .lineage(topic.into())
            .iter()
            .flat_map(|node| node.subscriptions())
            .filter(|sub| !sub.is_suspended())
            .count()
    }

    /// Whether a publish to `topic` would notify any subscriber.
    #[must_use]
    pub fn has_subscribers(&self, topic: impl Into<Topic>) -> bool {
        self.subscriptions_count(topic) > 0
    }

    /// Count of persisted messages retained under `topic`'s subtree.
    #[must_use]
    pub fn persisted_count(&self, topic: impl Into<Topic>) -> usize {
        self.core.borrow().tree.persisted_count(topic.into())
    }
}

impl Debug for Arbiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!(Arbiter))
            .field("instance_id", &self.instance_id())
            .finish()
    }
}

fn set_all_suspended(node: &mut TopicNode, suspended: bool) -> usize {
    let mut changed = 0;
    for sub in &mut node.subscriptions {
        if sub.suspended != suspended {
            sub.suspended = suspended;
            changed += 1;
        }
    }
    changed
}

fn replay_to(scheduler: &Scheduler, subscriber: &Subscriber, messages: Vec<PersistedMessage>) {
    for message in messages {
        let invocation = subscriber.invoke(message.data(), message.topic());
        // Replay outcomes feed no resolver
        scheduler.spawn(async move {
            let _ = invocation.await;
        });
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use futures::executor::LocalPool;
    use rstest::rstest;

    use super::*;
    use crate::{
        options::DEFAULT_LATCH,
        stubs::{callback_probe, recording_subscriber, rejecting_subscriber, value_subscriber},
    };

    fn broker() -> (LocalPool, Arbiter) {
        let pool = LocalPool::new();
        let arbiter = Arbiter::new(pool.spawner());
        (pool, arbiter)
    }

    fn ints(payloads: &[Payload]) -> Vec<i32> {
        payloads
            .iter()
            .map(|p| *p.downcast_ref::<i32>().unwrap())
            .collect()
    }

    #[rstest]
    fn test_ancestor_delivery() {
        let (mut pool, arbiter) = broker();
        let (f, f_calls) = recording_subscriber();
        let (g, g_calls) = recording_subscriber();
        let (h, h_calls) = recording_subscriber();

        arbiter.subscribe("a", f, None);
        arbiter.subscribe("a.b", g, None);
        arbiter.subscribe("", h, None);

        let publication = arbiter.publish("a.b", Payload::unit(), None);
        pool.run_until(publication).unwrap();

        for calls in [&f_calls, &g_calls, &h_calls] {
            assert_eq!(calls.count(), 1);
            let (topic, data) = calls.calls().remove(0);
            assert_eq!(topic, Topic::new("a.b"));
            assert!(data.is_unit());
        }
    }

    #[rstest]
    fn test_sibling_not_notified() {
        let (mut pool, arbiter) = broker();
        let (sibling, calls) = recording_subscriber();
        arbiter.subscribe("a.c", sibling, None);
        arbiter.subscribe("a.b", Subscriber::noop(), None);

        pool.run_until(arbiter.publish("a.b", Payload::unit(), None))
            .unwrap();
        assert_eq!(calls.count(), 0);
    }

    #[rstest]
    fn test_priority_across_lineage() {
        let (mut pool, arbiter) = broker();
        let order: Rc<RefCell<Vec<&'static str>>> = Rc::new(RefCell::new(Vec::new()));

        {
            let order = order.clone();
            arbiter.subscribe(
                "a",
                Subscriber::sink(move |_, _| order.borrow_mut().push("low")),
                Some(SubscribeOptions::new().priority(1)),
            );
        }
        {
            let order = order.clone();
            arbiter.subscribe(
                "a.b",
                Subscriber::sink(move |_, _| order.borrow_mut().push("high")),
                Some(SubscribeOptions::new().priority(10)),
            );
        }

        pool.run_until(arbiter.publish("a.b", Payload::unit(), None))
            .unwrap();
        assert_eq!(*order.borrow(), vec!["high", "low"]);
    }

    #[rstest]
    fn test_registration_order_within_equal_priority() {
        let (mut pool, arbiter) = broker();
        let order: Rc<RefCell<Vec<u32>>> = Rc::new(RefCell::new(Vec::new()));

        for value in 0..3 {
            let order = order.clone();
            arbiter.subscribe(
                "t",
                Subscriber::sink(move |_, _| order.borrow_mut().push(value)),
                None,
            );
        }

        pool.run_until(arbiter.publish("t", Payload::unit(), None))
            .unwrap();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[rstest]
    fn test_prevent_bubble_only_exact_topic() {
        let (mut pool, arbiter) = broker();
        let (ancestor, ancestor_calls) = recording_subscriber();
        let (exact, exact_calls) = recording_subscriber();

        arbiter.subscribe("a", ancestor, None);
        arbiter.subscribe("a.b", exact, None);

        let publication = arbiter.publish(
            "a.b",
            Payload::unit(),
            Some(PublishOptions::new().prevent_bubble(true)),
        );
        pool.run_until(publication).unwrap();

        assert_eq!(ancestor_calls.count(), 0);
        assert_eq!(exact_calls.count(), 1);
    }

    #[rstest]
    fn test_prevent_bubble_without_exact_node_notifies_nobody() {
        let (mut pool, arbiter) = broker();
        let (ancestor, calls) = recording_subscriber();
        arbiter.subscribe("a", ancestor, None);

        let publication = arbiter.publish(
            "a.b",
            Payload::unit(),
            Some(PublishOptions::new().prevent_bubble(true).latch(0.0)),
        );
        let verdict = pool.run_until(publication);
        assert_eq!(calls.count(), 0);
        // Latch 0 over zero subscribers still rejects: nothing can be reached
        assert!(verdict.is_err());
    }

    #[rstest]
    fn test_latch_count_settles_with_two_of_three() {
        let (mut pool, arbiter) = broker();
        let (subscriber, probe_a) = callback_probe();
        arbiter.subscribe("t", subscriber, None);
        let (subscriber, probe_b) = callback_probe();
        arbiter.subscribe("t", subscriber, None);
        let (subscriber, probe_c) = callback_probe();
        arbiter.subscribe("t", subscriber, None);

        let publication = arbiter.publish(
            "t",
            Payload::unit(),
            Some(PublishOptions::new().latch(2.0)),
        );
        let handle = publication.handle();

        pool.run_until_stalled();
        assert_eq!((probe_a.invoked(), probe_b.invoked(), probe_c.invoked()), (1, 1, 1));
        assert!(probe_a.fulfill_next(Payload::new(1_i32)));
        assert!(probe_b.fulfill_next(Payload::new(2_i32)));
        pool.run_until_stalled();

        assert!(handle.is_settled());
        let verdict = pool.run_until(publication);
        assert_eq!(ints(&verdict.unwrap()), vec![1, 2]);
        assert_eq!(handle.pending(), 1);
    }

    #[rstest]
    fn test_latch_infeasible_with_zero_subscribers() {
        let (mut pool, arbiter) = broker();
        let publication = arbiter.publish(
            "nobody.home",
            Payload::unit(),
            Some(PublishOptions::new().latch(1.0)),
        );
        let verdict = pool.run_until(publication);
        assert!(verdict.unwrap_err().is_empty());
    }

    #[rstest]
    fn test_default_latch_rejects_zero_subscribers() {
        let (mut pool, arbiter) = broker();
        let publication = arbiter.publish("nobody.home", Payload::unit(), None);
        let verdict = pool.run_until(publication);
        assert!(verdict.unwrap_err().is_empty());
    }

    #[rstest]
    fn test_default_latch_fulfills_when_all_fulfill() {
        let (mut pool, arbiter) = broker();
        arbiter.subscribe("t", value_subscriber(1_i32), None);
        arbiter.subscribe("t", value_subscriber(2_i32), None);

        let verdict = pool
            .run_until(arbiter.publish("t", Payload::unit(), None))
            .unwrap();
        assert_eq!(ints(&verdict), vec![1, 2]);
    }

    #[rstest]
    fn test_subscriber_rejection_routes_into_publication() {
        let (mut pool, arbiter) = broker();
        arbiter.subscribe("t", value_subscriber(1_i32), None);
        arbiter.subscribe("t", rejecting_subscriber(13_i32), None);

        let verdict = pool.run_until(arbiter.publish("t", Payload::unit(), None));
        assert_eq!(ints(&verdict.unwrap_err()), vec![13]);
    }

    #[rstest]
    fn test_settlement_latch_collects_both_lists() {
        let (mut pool, arbiter) = broker();
        arbiter.subscribe("t", value_subscriber(1_i32), None);
        arbiter.subscribe("t", rejecting_subscriber(2_i32), None);

        let publication = arbiter.publish(
            "t",
            Payload::unit(),
            Some(PublishOptions::new().latch(2.0).settlement_latch(true)),
        );
        let verdict = pool.run_until(publication).unwrap();
        // Fulfillments first, then rejections
        assert_eq!(ints(&verdict), vec![1, 2]);
    }

    #[rstest]
    fn test_semaphore_one_launches_in_priority_order() {
        let (mut pool, arbiter) = broker();
        let (first, first_probe) = callback_probe();
        let (second, second_probe) = callback_probe();
        let (third, third_probe) = callback_probe();

        arbiter.subscribe("t", third, Some(SubscribeOptions::new().priority(1)));
        arbiter.subscribe("t", first, Some(SubscribeOptions::new().priority(9)));
        arbiter.subscribe("t", second, Some(SubscribeOptions::new().priority(5)));

        let publication = arbiter.publish(
            "t",
            Payload::unit(),
            Some(PublishOptions::new().semaphore(1)),
        );
        let handle = publication.handle();

        pool.run_until_stalled();
        assert_eq!(
            (first_probe.invoked(), second_probe.invoked(), third_probe.invoked()),
            (1, 0, 0)
        );

        assert!(first_probe.fulfill_next(Payload::new(1_i32)));
        pool.run_until_stalled();
        assert_eq!((second_probe.invoked(), third_probe.invoked()), (1, 0));

        assert!(second_probe.fulfill_next(Payload::new(2_i32)));
        pool.run_until_stalled();
        assert_eq!(third_probe.invoked(), 1);

        assert!(third_probe.fulfill_next(Payload::new(3_i32)));
        let verdict = pool.run_until(publication);
        assert_eq!(ints(&verdict.unwrap()), vec![1, 2, 3]);
        assert!(handle.is_settled());
    }

    #[rstest]
    fn test_persisted_replay_order_and_removal() {
        let (mut pool, arbiter) = broker();
        arbiter.update_options(|options| options.sync = true);

        let first = arbiter.publish(
            "x.y.z",
            Payload::new(1_i32),
            Some(PublishOptions::new().persist(true)),
        );
        let second = arbiter.publish(
            "x",
            Payload::new(2_i32),
            Some(PublishOptions::new().persist(true)),
        );
        assert!(first.token().is_some());
        assert!(second.token().is_some());

        let (spy, calls) = recording_subscriber();
        arbiter.subscribe("x", spy, None);

        // Broker-level sync applies to the replay as well: inline
        assert_eq!(calls.count(), 2);
        let seen = calls.calls();
        assert_eq!(seen[0].0, Topic::new("x.y.z"));
        assert_eq!(seen[0].1.downcast_ref::<i32>(), Some(&1));
        assert_eq!(seen[1].0, Topic::new("x"));
        assert_eq!(seen[1].1.downcast_ref::<i32>(), Some(&2));

        assert_eq!(arbiter.remove_persisted_topics("x"), vec![true]);
        let (late, late_calls) = recording_subscriber();
        arbiter.subscribe("x", late, None);
        pool.run_until_stalled();
        assert_eq!(late_calls.count(), 0);
    }

    #[rstest]
    fn test_persisted_replay_is_deferred_without_sync() {
        let (mut pool, arbiter) = broker();
        let publication = arbiter.publish(
            "x",
            Payload::new(5_i32),
            Some(PublishOptions::new().persist(true).sync(true)),
        );
        drop(publication);

        let (spy, calls) = recording_subscriber();
        arbiter.subscribe("x", spy, None);
        assert_eq!(calls.count(), 0);

        pool.run_until_stalled();
        assert_eq!(calls.count(), 1);
    }

    #[rstest]
    fn test_ignore_persisted_skips_replay() {
        let (mut pool, arbiter) = broker();
        arbiter.publish(
            "x",
            Payload::new(5_i32),
            Some(PublishOptions::new().persist(true).sync(true)),
        );

        let (spy, calls) = recording_subscriber();
        arbiter.subscribe(
            "x",
            spy,
            Some(SubscribeOptions::new().ignore_persisted(true)),
        );
        pool.run_until_stalled();
        assert_eq!(calls.count(), 0);
    }

    #[rstest]
    fn test_remove_persisted_by_token() {
        let (_pool, arbiter) = broker();
        let publication = arbiter.publish(
            "x.y",
            Payload::new(1_i32),
            Some(PublishOptions::new().persist(true).sync(true)),
        );
        let token = publication.token().unwrap();
        assert_eq!(arbiter.persisted_count("x"), 1);

        assert!(arbiter.remove_persisted(&token));
        assert!(!arbiter.remove_persisted(&token));
        assert_eq!(arbiter.persisted_count("x"), 0);
    }

    #[rstest]
    fn test_remove_persisted_publication() {
        let (_pool, arbiter) = broker();
        let publication = arbiter.publish(
            "x",
            Payload::new(1_i32),
            Some(PublishOptions::new().persist(true).sync(true)),
        );
        assert!(arbiter.remove_persisted_publication(&publication));
        assert!(!arbiter.remove_persisted_publication(&publication));
    }

    #[rstest]
    fn test_unsubscribe_and_token_not_found() {
        let (mut pool, arbiter) = broker();
        let (spy, calls) = recording_subscriber();
        let tokens = arbiter.subscribe("a", spy, None);

        assert!(arbiter.unsubscribe(&tokens[0]));
        assert!(!arbiter.unsubscribe(&tokens[0]));

        let publication = arbiter.publish("a", Payload::unit(), None);
        pool.run_until_stalled();
        assert_eq!(calls.count(), 0);
        drop(publication);
    }

    #[rstest]
    fn test_suspend_and_resubscribe() {
        let (mut pool, arbiter) = broker();
        let (spy, calls) = recording_subscriber();
        let tokens = arbiter.subscribe("a", spy, None);

        assert!(arbiter.suspend(&tokens[0]));
        let publication = arbiter.publish("a", Payload::unit(), None);
        pool.run_until_stalled();
        assert_eq!(calls.count(), 0);
        assert!(!arbiter.has_subscribers("a"));
        drop(publication);

        assert!(arbiter.resubscribe(&tokens[0]));
        pool.run_until(arbiter.publish("a", Payload::unit(), None))
            .unwrap();
        assert_eq!(calls.count(), 1);
    }

    #[rstest]
    fn test_topic_sweeps_cover_descendants() {
        let (mut pool, arbiter) = broker();
        let (spy, calls) = recording_subscriber();
        arbiter.subscribe(["a", "a.b", "a.b.c"], spy, None);

        assert_eq!(arbiter.suspend_topics("a"), vec![true]);
        let publication = arbiter.publish("a.b.c", Payload::unit(), None);
        pool.run_until_stalled();
        assert_eq!(calls.count(), 0);
        drop(publication);

        assert_eq!(arbiter.resubscribe_topics("a"), vec![true]);
        pool.run_until(arbiter.publish("a.b.c", Payload::unit(), None))
            .unwrap();
        assert_eq!(calls.count(), 3);

        assert_eq!(arbiter.unsubscribe_topics("a.b"), vec![true]);
        assert_eq!(arbiter.subscriptions_count("a.b.c"), 1);
        assert_eq!(arbiter.unsubscribe_topics("missing"), vec![false]);
    }

    #[rstest]
    fn test_expression_subscribe_returns_token_per_topic() {
        let (mut pool, arbiter) = broker();
        let (spy, calls) = recording_subscriber();
        let tokens = arbiter.subscribe("a, b.c", spy, None);

        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].topic(), Topic::new("a"));
        assert_eq!(tokens[1].topic(), Topic::new("b.c"));

        pool.run_until(arbiter.publish("b.c", Payload::unit(), None))
            .unwrap();
        assert_eq!(calls.count(), 1);
    }

    #[rstest]
    fn test_duplicate_ancestor_subscription_not_deduplicated() {
        let (mut pool, arbiter) = broker();
        let (spy, calls) = recording_subscriber();
        arbiter.subscribe(["a", "a.b"], spy, None);

        pool.run_until(arbiter.publish("a.b", Payload::unit(), None))
            .unwrap();
        // One notification per ancestor registration
        assert_eq!(calls.count(), 2);
    }

    #[rstest]
    fn test_deferred_publishes_dispatch_in_order() {
        let (mut pool, arbiter) = broker();
        let order: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
        {
            let order = order.clone();
            arbiter.subscribe(
                "t",
                Subscriber::sink(move |data, _| {
                    order
                        .borrow_mut()
                        .push(*data.downcast_ref::<i32>().unwrap());
                }),
                None,
            );
        }

        let first = arbiter.publish("t", Payload::new(1_i32), None);
        let second = arbiter.publish("t", Payload::new(2_i32), None);
        pool.run_until_stalled();

        assert_eq!(*order.borrow(), vec![1, 2]);
        drop((first, second));
    }

    #[rstest]
    fn test_sync_publish_invokes_inline() {
        let (_pool, arbiter) = broker();
        let (spy, calls) = recording_subscriber();
        arbiter.subscribe("t", spy, None);

        arbiter.publish(
            "t",
            Payload::unit(),
            Some(PublishOptions::new().sync(true)),
        );
        // Subscriber function ran inline; its outcome settles later
        assert_eq!(calls.count(), 1);
    }

    #[rstest]
    fn test_deferred_publish_counters_zero_until_dispatch() {
        let (mut pool, arbiter) = broker();
        arbiter.subscribe("t", value_subscriber(1_i32), None);

        let publication = arbiter.publish("t", Payload::unit(), None);
        let handle = publication.handle();
        assert_eq!(handle.total(), 0);
        assert_eq!(handle.pending(), 0);

        pool.run_until(publication).unwrap();
        assert_eq!(handle.total(), 1);
        assert_eq!(handle.fulfilled(), 1);
    }

    #[rstest]
    fn test_mutating_defaults_affects_later_operations() {
        let (mut pool, arbiter) = broker();
        arbiter.subscribe("t", rejecting_subscriber(1_i32), None);

        // All-must-fulfill default: rejects
        let verdict = pool.run_until(arbiter.publish("t", Payload::unit(), None));
        assert!(verdict.is_err());

        arbiter.update_options(|options| {
            options.latch = 1.0;
            options.settlement_latch = true;
        });
        let verdict = pool.run_until(arbiter.publish("t", Payload::unit(), None));
        assert!(verdict.is_ok());
    }

    #[rstest]
    fn test_brokers_are_independent() {
        let (mut pool, arbiter) = broker();
        let other = arbiter.create();
        assert_ne!(arbiter.instance_id(), other.instance_id());

        let (spy, calls) = recording_subscriber();
        arbiter.subscribe("t", spy, None);
        other.publish(
            "t",
            Payload::new(1_i32),
            Some(PublishOptions::new().persist(true).sync(true)),
        );

        pool.run_until_stalled();
        assert_eq!(calls.count(), 0);
        assert_eq!(other.persisted_count(""), 1);
        assert_eq!(arbiter.persisted_count(""), 0);

        // Independent id spaces: both start from 1
        let token_a = &arbiter.subscribe("s", Subscriber::noop(), None)[0];
        let other_token = other.publish(
            "s",
            Payload::unit(),
            Some(PublishOptions::new().persist(true).sync(true)),
        );
        assert_eq!(token_a.id(), 2);
        assert_eq!(other_token.token().unwrap().id(), 2);
    }

    #[rstest]
    fn test_detached_handle_keeps_working() {
        let (mut pool, arbiter) = broker();
        let detached = arbiter.clone();
        drop(arbiter);

        let (spy, calls) = recording_subscriber();
        detached.subscribe("t", spy, None);
        pool.run_until(detached.publish("t", Payload::unit(), None))
            .unwrap();
        assert_eq!(calls.count(), 1);
    }

    #[rstest]
    fn test_reentrant_publish_from_subscriber() {
        let (mut pool, arbiter) = broker();
        let (inner_spy, inner_calls) = recording_subscriber();
        arbiter.subscribe("inner", inner_spy, None);

        {
            let reentrant = arbiter.clone();
            arbiter.subscribe(
                "outer",
                Subscriber::sink(move |_, _| {
                    reentrant.publish("inner", Payload::unit(), None);
                }),
                None,
            );
        }

        pool.run_until(arbiter.publish("outer", Payload::unit(), None))
            .unwrap();
        pool.run_until_stalled();
        assert_eq!(inner_calls.count(), 1);
    }

    #[rstest]
    fn test_update_after_settlement_keeps_recording() {
        let (mut pool, arbiter) = broker();
        let (fast, fast_probe) = callback_probe();
        let (slow, slow_probe) = callback_probe();
        arbiter.subscribe("t", fast, Some(SubscribeOptions::new().priority(1)));
        arbiter.subscribe("t", slow, None);

        let publication = arbiter.publish(
            "t",
            Payload::unit(),
            Some(
                PublishOptions::new()
                    .latch(1.0)
                    .update_after_settlement(true),
            ),
        );
        let handle = publication.handle();

        pool.run_until_stalled();
        assert!(fast_probe.fulfill_next(Payload::new(1_i32)));
        pool.run_until_stalled();
        assert!(handle.is_settled());

        let verdict = pool.run_until(publication);
        assert_eq!(ints(&verdict.unwrap()), vec![1]);

        assert!(slow_probe.fulfill_next(Payload::new(2_i32)));
        pool.run_until_stalled();
        assert_eq!(ints(&handle.fulfilled_values()), vec![1, 2]);
        assert_eq!(handle.pending(), 0);
    }

    #[rstest]
    fn test_subscribe_to_root_sees_everything() {
        let (mut pool, arbiter) = broker();
        let (spy, calls) = recording_subscriber();
        arbiter.subscribe("", spy, None);

        pool.run_until(arbiter.publish("deep.down.topic", Payload::unit(), None))
            .unwrap();
        pool.run_until(arbiter.publish("", Payload::unit(), None))
            .unwrap();
        assert_eq!(calls.count(), 2);
    }

    #[rstest]
    fn test_default_latch_constant_matches_behavior() {
        // The encoded default is the largest f64 below 1
        assert_eq!(DEFAULT_LATCH, 1.0_f64.next_down());
    }
}
