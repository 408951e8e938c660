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

//! Hierarchical dispatch of publications.
//!
//! A publish resolves the topic's lineage, merges the ancestor subscription
//! lists into one priority-ordered dispatch list, and launches invocations
//! bounded by the semaphore. Each settlement feeds the resolver and then
//! hands its slot to the next queued subscription.
//!
//! Subscriber code never runs while the broker state is borrowed: the
//! dispatch list is cloned out first, so subscribers may re-enter the façade
//! freely.

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use smallvec::SmallVec;

use crate::{
    broker::ArbiterCore,
    merge::{DispatchKey, DispatchOrder, KWayMerge},
    message::Payload,
    options::Options,
    resolver::{Publication, Resolver},
    runtime::Scheduler,
    subscription::{Subscription, Token},
    topic::Topic,
};

/// Inline capacity for dispatch-list buffers before heap allocation.
pub(crate) const DISPATCH_BUFFER_CAP: usize = 8;

type DispatchList = SmallVec<[Subscription; DISPATCH_BUFFER_CAP]>;

struct Flight {
    queue: VecDeque<Subscription>,
    in_flight: usize,
    semaphore: usize,
}

impl Flight {
    /// Claims a semaphore slot for the next queued subscription.
    fn launch_slot(&mut self) -> Option<Subscription> {
        if self.in_flight >= self.semaphore {
            return None;
        }
        let sub = self.queue.pop_front()?;
        self.in_flight += 1;
        Some(sub)
    }

    /// Hands a settled invocation's slot to the next queued subscription.
    fn continuation(&mut self) -> Option<Subscription> {
        let next = self.queue.pop_front();
        if next.is_none() {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
        next
    }
}

/// Publishes `data` to `topic` under the already-merged `options`.
///
/// The publication future exists from this call; with `sync=false` the whole
/// dispatch (including persistence and counter initialization) happens on a
/// later scheduler turn.
pub(crate) fn publish(
    core: &Rc<RefCell<ArbiterCore>>,
    scheduler: &Scheduler,
    topic: Topic,
    data: Payload,
    options: Options,
) -> Publication {
    let (publication, state) = Publication::new();
    let resolver = Resolver::new(
        state,
        options.latch,
        options.settlement_latch,
        options.update_after_settlement,
    );

    if options.sync {
        dispatch(core, scheduler, topic, data, options, resolver);
    } else {
        let core = core.clone();
        let scheduler_for_dispatch = scheduler.clone();
        scheduler.defer(move || {
            dispatch(
                &core,
                &scheduler_for_dispatch,
                topic,
                data,
                options,
                resolver,
            );
        });
    }

    publication
}

fn dispatch(
    core: &Rc<RefCell<ArbiterCore>>,
    scheduler: &Scheduler,
    topic: Topic,
    data: Payload,
    options: Options,
    resolver: Resolver,
) {
    let list = {
        let mut core_ref = core.borrow_mut();
        let list = build_dispatch_list(&core_ref, topic, options.prevent_bubble);
        if options.persist {
            let order = core_ref.ids.generate();
            core_ref.tree.append_persisted(topic, data.clone(), order);
            resolver.set_token(Token::persisted(topic, order));
        }
        list
    };

    log::debug!("Dispatching '{topic}' to {} subscriber(s)", list.len());
    resolver.begin(list.len());

    let resolver = Rc::new(resolver);
    let flight = Rc::new(RefCell::new(Flight {
        queue: list.into_iter().collect(),
        in_flight: 0,
        semaphore: options.semaphore,
    }));

    loop {
        let next = flight.borrow_mut().launch_slot();
        match next {
            Some(sub) => launch(scheduler, &flight, &resolver, sub, data.clone(), topic),
            None => break,
        }
    }

    resolver.evaluate();
}

fn build_dispatch_list(core: &ArbiterCore, topic: Topic, prevent_bubble: bool) -> DispatchList {
    let lineage = core.tree.lineage(topic);

    if prevent_bubble {
        // Only exact-topic subscribers, and only when the node exists
        let terminal = lineage.last().copied();
        return match terminal {
            Some(node) if node.topic() == topic => DispatchOrder::new(node.subscriptions())
                .filter(|sub| !sub.suspended)
                .cloned()
                .collect(),
            _ => DispatchList::new(),
        };
    }

    let sources: Vec<_> = lineage
        .iter()
        .map(|node| DispatchOrder::new(node.subscriptions()))
        .collect();
    KWayMerge::new(sources, |sub: &&Subscription| DispatchKey::of(sub))
        .filter(|sub| !sub.suspended)
        .cloned()
        .collect()
}

fn launch(
    scheduler: &Scheduler,
    flight: &Rc<RefCell<Flight>>,
    resolver: &Rc<Resolver>,
    sub: Subscription,
    data: Payload,
    topic: Topic,
) {
    let invocation = sub.subscriber.invoke(data.clone(), topic);

    let scheduler_for_settlement = scheduler.clone();
    let flight = flight.clone();
    let resolver = resolver.clone();
    scheduler.spawn(async move {
        let outcome = invocation.await;
        if !resolver.record(outcome) {
            // Settled without update-after-settlement: the pipeline freezes
            return;
        }
        let next = flight.borrow_mut().continuation();
        match next {
            Some(sub) => launch(
                &scheduler_for_settlement,
                &flight,
                &resolver,
                sub,
                data,
                topic,
            ),
            None => resolver.evaluate(),
        }
    });
}
