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

//! Monotonic identifier generation.

/// Generates broker-wide identifiers, strictly increasing from 1.
///
/// A single generator serves both subscription ids and persisted publication
/// orders so that relative creation order is reconstructible across both.
#[derive(Clone, Debug, Default)]
pub struct IdGenerator {
    count: u64,
}

impl IdGenerator {
    /// Creates a new [`IdGenerator`] instance.
    #[must_use]
    pub const fn new() -> Self {
        Self { count: 0 }
    }

    pub const fn set_count(&mut self, count: u64) {
        self.count = count;
    }

    pub const fn reset(&mut self) {
        self.count = 0;
    }

    #[must_use]
    pub const fn count(&self) -> u64 {
        self.count
    }

    /// Returns the next identifier.
    pub const fn generate(&mut self) -> u64 {
        self.count += 1;
        self.count
    }
}
