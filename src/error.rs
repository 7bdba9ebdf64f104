/* Copyright (C) 2022 Antmicro
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     https://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use crate::arch::SidePair;
use crate::formula::FormulaError;

/// Fatal errors of a switchblock build. The build is all-or-nothing: none of
/// these leave a partially filled connection map behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// Architecture records disagree with each other or with the device.
    ConfigMismatch(String),
    /// A permutation formula could not be parsed or evaluated.
    Formula {
        switchblock: String,
        sides: SidePair,
        error: FormulaError,
    },
    /// Track metadata violates the channel geometry invariants.
    InternalConsistency(String),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConfigMismatch(msg) => write!(f, "configuration mismatch: {}", msg),
            Self::Formula { switchblock, sides, error } => write!(
                f,
                "switchblock {}, permutation {} ({} -> {}): {}",
                switchblock, sides, sides.from, sides.to, error
            ),
            Self::InternalConsistency(msg) => write!(f, "internal consistency error: {}", msg),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Formula { error, .. } => Some(error),
            _ => None,
        }
    }
}
