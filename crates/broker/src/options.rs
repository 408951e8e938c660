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

//! Broker and per-operation options.
//!
//! The broker carries one mutable [`Options`] value; each publish and
//! subscribe may override individual fields through [`PublishOptions`] /
//! [`SubscribeOptions`], shallow-merged over the broker defaults.

use promissory_core::correctness::{FAILED, check_finite_f64, check_non_negative_f64};
use serde::{Deserialize, Serialize};

use crate::subscription::Priority;

/// The largest f64 strictly below 1. As the default latch it makes "all
/// subscribers must fulfill" the default policy through the fractional
/// branches; note that with exactly zero subscribers such a publication
/// rejects rather than fulfills.
pub const DEFAULT_LATCH: f64 = 0.999_999_999_999_999_9;

/// Broker-level defaults applied to every operation unless overridden.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Options {
    /// Retain publications for late delivery.
    pub persist: bool,
    /// Dispatch inline instead of on the next scheduler turn.
    pub sync: bool,
    /// Notify only exact-topic subscribers, never ancestors.
    pub prevent_bubble: bool,
    /// Latch threshold: a count when >= 1, otherwise a fraction.
    pub latch: f64,
    /// Latch over settled outcomes instead of fulfillments only.
    pub settlement_latch: bool,
    /// Upper bound on concurrently pending subscriber invocations.
    pub semaphore: usize,
    /// Keep recording outcomes after the publication settles.
    pub update_after_settlement: bool,
    /// Default subscription priority.
    pub priority: Priority,
    /// Skip persisted replay on subscribe.
    pub ignore_persisted: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            persist: false,
            sync: false,
            prevent_bubble: false,
            latch: DEFAULT_LATCH,
            settlement_latch: false,
            semaphore: usize::MAX,
            update_after_settlement: false,
            priority: Priority::ZERO,
            ignore_persisted: false,
        }
    }
}

fn checked_latch(value: f64) -> f64 {
    check_finite_f64(value, stringify!(latch)).expect(FAILED);
    check_non_negative_f64(value, stringify!(latch)).expect(FAILED);
    value
}

/// Per-publish overrides, shallow-merged over the broker defaults.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishOptions {
    pub persist: Option<bool>,
    pub sync: Option<bool>,
    pub prevent_bubble: Option<bool>,
    pub latch: Option<f64>,
    pub settlement_latch: Option<bool>,
    pub semaphore: Option<usize>,
    pub update_after_settlement: Option<bool>,
}

impl PublishOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn persist(mut self, value: bool) -> Self {
        self.persist = Some(value);
        self
    }

    #[must_use]
    pub fn sync(mut self, value: bool) -> Self {
        self.sync = Some(value);
        self
    }

    #[must_use]
    pub fn prevent_bubble(mut self, value: bool) -> Self {
        self.prevent_bubble = Some(value);
        self
    }

    /// Sets the latch threshold: a count when >= 1, otherwise a fraction of
    /// the dispatch list.
    ///
    /// # Panics
    ///
    /// Panics if `value` is NaN, infinite, or negative.
    #[must_use]
    pub fn latch(mut self, value: f64) -> Self {
        self.latch = Some(checked_latch(value));
        self
    }

    #[must_use]
    pub fn settlement_latch(mut self, value: bool) -> Self {
        self.settlement_latch = Some(value);
        self
    }

    #[must_use]
    pub fn semaphore(mut self, value: usize) -> Self {
        self.semaphore = Some(value);
        self
    }

    #[must_use]
    pub fn update_after_settlement(mut self, value: bool) -> Self {
        self.update_after_settlement = Some(value);
        self
    }

    pub(crate) fn merged_into(&self, defaults: Options) -> Options {
        Options {
            persist: self.persist.unwrap_or(defaults.persist),
            sync: self.sync.unwrap_or(defaults.sync),
            prevent_bubble: self.prevent_bubble.unwrap_or(defaults.prevent_bubble),
            latch: self.latch.unwrap_or(defaults.latch),
            settlement_latch: self.settlement_latch.unwrap_or(defaults.settlement_latch),
            semaphore: self.semaphore.unwrap_or(defaults.semaphore),
            update_after_settlement: self
                .update_after_settlement
                .unwrap_or(defaults.update_after_settlement),
            priority: defaults.priority,
            ignore_persisted: defaults.ignore_persisted,
        }
    }
}

/// Per-subscribe overrides, shallow-merged over the broker defaults.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeOptions {
    pub priority: Option<Priority>,
    pub ignore_persisted: Option<bool>,
    pub sync: Option<bool>,
}

impl SubscribeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the subscription priority.
    ///
    /// # Panics
    ///
    /// Panics if the priority is NaN or infinite.
    #[must_use]
    pub fn priority(mut self, value: impl Into<Priority>) -> Self {
        self.priority = Some(value.into());
        self
    }

    #[must_use]
    pub fn ignore_persisted(mut self, value: bool) -> Self {
        self.ignore_persisted = Some(value);
        self
    }

    #[must_use]
    pub fn sync(mut self, value: bool) -> Self {
        self.sync = Some(value);
        self
    }

    pub(crate) fn merged_into(&self, defaults: Options) -> Options {
        Options {
            priority: self.priority.unwrap_or(defaults.priority),
            ignore_persisted: self.ignore_persisted.unwrap_or(defaults.ignore_persisted),
            sync: self.sync.unwrap_or(defaults.sync),
            ..defaults
        }
    }
}
