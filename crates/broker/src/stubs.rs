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

//! Stub subscribers for exercising the broker in tests.

use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt::{self, Debug},
    rc::Rc,
};

use crate::{
    handler::{Done, Subscriber},
    message::Payload,
    topic::Topic,
};

/// Records every invocation it receives.
#[derive(Clone, Default)]
pub struct Recorder {
    calls: Rc<RefCell<Vec<(Topic, Payload)>>>,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a subscriber that records into this recorder and fulfills
    /// with the unit payload.
    #[must_use]
    pub fn subscriber(&self) -> Subscriber {
        let calls = self.calls.clone();
        Subscriber::sink(move |data, topic| calls.borrow_mut().push((topic, data)))
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.calls.borrow().len()
    }

    #[must_use]
    pub fn topics(&self) -> Vec<Topic> {
        self.calls.borrow().iter().map(|(topic, _)| *topic).collect()
    }

    #[must_use]
    pub fn calls(&self) -> Vec<(Topic, Payload)> {
        self.calls.borrow().clone()
    }

    pub fn clear(&self) {
        self.calls.borrow_mut().clear();
    }
}

impl Debug for Recorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!(Recorder))
            .field("count", &self.count())
            .finish()
    }
}

/// Creates a recording subscriber and the recorder observing it.
#[must_use]
pub fn recording_subscriber() -> (Subscriber, Recorder) {
    let recorder = Recorder::new();
    (recorder.subscriber(), recorder)
}

/// A callback-shaped subscriber whose completions are driven by the test.
#[derive(Clone, Default)]
pub struct CallbackProbe {
    dones: Rc<RefCell<VecDeque<Done>>>,
    invoked: Rc<RefCell<usize>>,
}

impl CallbackProbe {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscriber(&self) -> Subscriber {
        let dones = self.dones.clone();
        let invoked = self.invoked.clone();
        Subscriber::from_callback(move |_, _, done| {
            *invoked.borrow_mut() += 1;
            dones.borrow_mut().push_back(done);
        })
    }

    /// How many times the subscriber has been invoked.
    #[must_use]
    pub fn invoked(&self) -> usize {
        *self.invoked.borrow()
    }

    /// Fulfills the oldest unanswered invocation. Returns whether one was
    /// waiting.
    pub fn fulfill_next(&self, value: Payload) -> bool {
        match self.dones.borrow_mut().pop_front() {
            Some(done) => {
                done.fulfill(value);
                true
            }
            None => false,
        }
    }

    /// Rejects the oldest unanswered invocation. Returns whether one was
    /// waiting.
    pub fn reject_next(&self, error: Payload) -> bool {
        match self.dones.borrow_mut().pop_front() {
            Some(done) => {
                done.reject(error);
                true
            }
            None => false,
        }
    }
}

impl Debug for CallbackProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(stringify!(CallbackProbe))
            .field("invoked", &self.invoked())
            .field("waiting", &self.dones.borrow().len())
            .finish()
    }
}

/// Creates a callback subscriber and the probe driving it.
#[must_use]
pub fn callback_probe() -> (Subscriber, CallbackProbe) {
    let probe = CallbackProbe::new();
    (probe.subscriber(), probe)
}

/// A subscriber fulfilling every invocation with a clone of `value`.
pub fn value_subscriber<T: Clone + 'static>(value: T) -> Subscriber {
    Subscriber::from_fn(move |_, _| Ok(Payload::new(value.clone())))
}

/// A subscriber rejecting every invocation with a clone of `error`.
pub fn rejecting_subscriber<T: Clone + 'static>(error: T) -> Subscriber {
    Subscriber::from_fn(move |_, _| Err(Payload::new(error.clone())))
}
