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

//! Opaque values carried through publications and subscriber outcomes.

use std::{
    any::Any,
    fmt::{self, Debug},
    rc::Rc,
};

/// An opaque, cheaply cloneable value.
///
/// Payloads carry published data into subscribers, and subscriber outcome
/// values back into publication results. Uses `Rc` (not `Arc`): the broker is
/// single-threaded and payloads never cross threads.
#[derive(Clone)]
pub struct Payload {
    value: Rc<dyn Any>,
}

impl Payload {
    /// Wraps `value` as an opaque payload.
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            value: Rc::new(value),
        }
    }

    /// The "no data" payload, delivered when a publish carries no value and
    /// produced by no-op subscribers.
    #[must_use]
    pub fn unit() -> Self {
        Self::new(())
    }

    /// Returns whether the payload is the unit value.
    #[must_use]
    pub fn is_unit(&self) -> bool {
        self.is::<()>()
    }

    /// Returns whether the contained value is of type `T`.
    #[must_use]
    pub fn is<T: 'static>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Returns a reference to the contained value if it is of type `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl Default for Payload {
    fn default() -> Self {
        Self::unit()
    }
}

impl Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unit() {
            write!(f, "{}(())", stringify!(Payload))
        } else {
            write!(f, "{}(<opaque>)", stringify!(Payload))
        }
    }
}

/// The uniform result of one subscriber invocation: a fulfillment value or a
/// rejection value.
pub type Outcome = Result<Payload, Payload>;
