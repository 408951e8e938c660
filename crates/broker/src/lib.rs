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

//! In-process, hierarchical, topic-based publish/subscribe with *promissory*
//! publication semantics.
//!
//! # Overview
//!
//! Topics are dotted strings forming a hierarchy rooted at the empty string.
//! Publishing to `"a.b"` notifies the active subscribers of `"a.b"`, `"a"`,
//! and `""` (unless bubbling is prevented), launching them in priority order
//! across the whole lineage. Every publish returns a [`Publication`] future
//! whose resolution is decided by a configurable *latch* over the subscriber
//! outcomes (by count or fraction, over fulfillments or all settlements),
//! rejecting early once the latch can no longer be met.
//!
//! Further capabilities:
//!
//! - **Persistence**: a publish may be retained and replayed to late
//!   subscribers of any ancestor topic, in global creation order.
//! - **Semaphore**: the number of concurrently pending subscriber
//!   invocations per publish can be bounded; settled invocations hand their
//!   slot to the next queued subscriber.
//! - **Suspension**: subscriptions can be suspended and reactivated without
//!   losing their place.
//!
//! # Concurrency model
//!
//! Single-threaded cooperative, in the same style as a thread-local message
//! bus: broker state lives behind `Rc<RefCell<..>>` and all transitions
//! happen on one executor. The broker needs only a
//! [`futures::task::LocalSpawn`] implementation to run, for example
//! `futures::executor::LocalPool`, or a tokio `LocalSet` through the `live`
//! feature.

pub mod broker;
pub mod handler;
pub mod ids;
pub mod merge;
pub mod message;
pub mod options;
pub mod persist;
pub mod resolver;
pub mod runtime;
pub mod subscription;
pub mod topic;
pub mod tree;

mod dispatch;

#[cfg(any(test, feature = "stubs"))]
pub mod stubs;

pub use crate::{
    broker::Arbiter,
    handler::{Done, Subscriber},
    merge::KWayMerge,
    message::{Outcome, Payload},
    options::{DEFAULT_LATCH, Options, PublishOptions, SubscribeOptions},
    persist::PersistedMessage,
    resolver::{Publication, PublicationHandle, Verdict},
    runtime::Scheduler,
    subscription::{Priority, Subscription, Token},
    topic::{Topic, TopicExpr},
    tree::{TopicNode, TopicTree},
};

#[cfg(feature = "live")]
pub use crate::runtime::TokioSpawner;
