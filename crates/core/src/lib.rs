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

//! Foundation utilities shared across the promissory broker workspace.
//!
//! This crate has no knowledge of brokers, topics, or subscriptions; it only
//! provides the small building blocks the rest of the workspace leans on:
//!
//! - [`correctness`]: argument validation helpers used at API boundaries.
//! - [`uuid`]: a thin UUID v4 wrapper for instance identity.

pub mod correctness;
pub mod uuid;

pub use crate::uuid::UUID4;
