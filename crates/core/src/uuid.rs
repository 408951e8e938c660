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

//! A universally unique identifier (UUID) version 4.

use std::{
    fmt::{self, Debug, Display},
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A UUID v4 identifier, used for instance identity across the workspace.
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UUID4 {
    value: Uuid,
}

impl UUID4 {
    /// Creates a new random [`UUID4`] instance.
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: Uuid::new_v4(),
        }
    }

    /// Returns the underlying [`Uuid`].
    #[must_use]
    pub const fn inner(&self) -> Uuid {
        self.value
    }
}

impl Default for UUID4 {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for UUID4 {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self {
            value: Uuid::parse_str(value)?,
        })
    }
}

impl From<Uuid> for UUID4 {
    fn from(value: Uuid) -> Self {
        Self { value }
    }
}

impl Display for UUID4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl Debug for UUID4 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}('{}')", stringify!(UUID4), self.value)
    }
}

////////////////////////////////////////////////////////////////////////////////
// Tests
////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn test_new_unique() {
        let a = UUID4::new();
        let b = UUID4::new();
        assert_ne!(a, b);
    }

    #[rstest]
    fn test_from_str_round_trip() {
        let original = UUID4::new();
        let parsed: UUID4 = original.to_string().parse().unwrap();
        assert_eq!(parsed, original);
    }

    #[rstest]
    fn test_from_str_invalid() {
        assert!("not-a-uuid".parse::<UUID4>().is_err());
    }

    #[rstest]
    fn test_serde_round_trip() {
        let original = UUID4::new();
        let json = serde_json::to_string(&original).unwrap();
        let decoded: UUID4 = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, original);
    }

    #[rstest]
    fn test_debug_format() {
        let value = UUID4::new();
        assert_eq!(format!("{value:?}"), format!("UUID4('{value}')"));
    }
}
