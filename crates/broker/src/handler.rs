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

//! Subscriber shapes and the invocation adapter.
//!
//! Three invocation protocols are supported, each collapsing to the same
//! uniform future over [`Outcome`]:
//!
//! - **Value**: a synchronous function whose `Ok` is the fulfillment and
//!   whose `Err` is the rejection.
//! - **Future**: a function returning a future which is awaited for the
//!   outcome.
//! - **Callback**: a function handed a single-shot [`Done`] completion
//!   handle.
//!
//! Anything that is not a subscriber at all is represented by the no-op
//! shape, which fulfills with the unit payload so publications still settle.

use std::{
    fmt::{self, Debug},
    rc::Rc,
};

use futures::{
    FutureExt,
    channel::oneshot,
    future::{self, Future, LocalBoxFuture},
};

use crate::{
    message::{Outcome, Payload},
    topic::Topic,
};

/// Single-shot completion handle passed to callback-shaped subscribers.
///
/// Dropping the handle without calling either method leaves that invocation
/// pending forever; the publication can then only settle through its latch.
#[derive(Debug)]
pub struct Done {
    sender: oneshot::Sender<Outcome>,
}

impl Done {
    /// Completes the invocation with a fulfillment value.
    pub fn fulfill(self, value: Payload) {
        let _ = self.sender.send(Ok(value));
    }

    /// Completes the invocation with a rejection value.
    pub fn reject(self, error: Payload) {
        let _ = self.sender.send(Err(error));
    }
}

enum SubscriberFn {
    Value(Rc<dyn Fn(Payload, Topic) -> Outcome>),
    Future(Rc<dyn Fn(Payload, Topic) -> LocalBoxFuture<'static, Outcome>>),
    Callback(Rc<dyn Fn(Payload, Topic, Done)>),
    Noop,
}

/// A subscriber in one of the supported invocation shapes.
#[derive(Clone)]
pub struct Subscriber {
    call: SubscriberFn,
}

impl Subscriber {
    /// Creates a subscriber from a synchronous function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(Payload, Topic) -> Outcome + 'static,
    {
        Self {
            call: SubscriberFn::Value(Rc::new(f)),
        }
    }

    /// Creates a subscriber from a future-returning function.
    pub fn from_future<F, Fut>(f: F) -> Self
    where
        F: Fn(Payload, Topic) -> Fut + 'static,
        Fut: Future<Output = Outcome> + 'static,
    {
        Self {
            call: SubscriberFn::Future(Rc::new(move |data, topic| f(data, topic).boxed_local())),
        }
    }

    /// Creates a subscriber completed through a [`Done`] handle.
    pub fn from_callback<F>(f: F) -> Self
    where
        F: Fn(Payload, Topic, Done) + 'static,
    {
        Self {
            call: SubscriberFn::Callback(Rc::new(f)),
        }
    }

    /// Creates an observer that fulfills with the unit payload.
    pub fn sink<F>(f: F) -> Self
    where
        F: Fn(Payload, Topic) + 'static,
    {
        Self::from_fn(move |data, topic| {
            f(data, topic);
            Ok(Payload::unit())
        })
    }

    /// The placeholder standing in for non-callable subscribers.
    #[must_use]
    pub fn noop() -> Self {
        Self {
            call: SubscriberFn::Noop,
        }
    }

    /// Invokes the subscriber with `(data, topic)` now, returning the uniform
    /// outcome future.
    pub(crate) fn invoke(&self, data: Payload, topic: Topic) -> LocalBoxFuture<'static, Outcome> {
        match &self.call {
            SubscriberFn::Value(f) => future::ready(f(data, topic)).boxed_local(),
            SubscriberFn::Future(f) => f(data, topic),
            SubscriberFn::Callback(f) => {
                let (sender, receiver) = oneshot::channel();
                f(data, topic, Done { sender });
                receiver
                    .then(|result| match result {
                        Ok(outcome) => future::ready(outcome).left_future(),
                        // Handle dropped without completing: forever pending
                        Err(oneshot::Canceled) => future::pending().right_future(),
                    })
                    .boxed_local()
            }
            SubscriberFn::Noop => future::ready(Ok(Payload::unit())).boxed_local(),
        }
    }
}

impl Clone for SubscriberFn {
    fn clone(&self) -> Self {
        match self {
            Self::Value(f) => Self::Value(f.clone()),
            Self::Future(f) => Self::Future(f.clone()),
            Self::Callback(f) => Self::Callback(f.clone()),
            Self::Noop => Self::Noop,
        }
    }
}

impl Debug for Subscriber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape = match self.call {
            SubscriberFn::Value(_) => "value",
            SubscriberFn::Future(_) => "future",
            SubscriberFn::Callback(_) => "callback",
            SubscriberFn::Noop => "noop",
        };
        f.debug_struct(stringify!(Subscriber))
            .field("shape", &shape)
            .finish()
    }
}
