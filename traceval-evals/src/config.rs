// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Configuration for evaluation runs
//!
//! Bounds applied to data that leaves the process through spans and score
//! records. Loadable from TOML and overridable through environment variables.

use serde::{Deserialize, Serialize};
use std::env;

/// Default number of characters of an item's input copied onto its span
pub const DEFAULT_INPUT_PREVIEW_CHARS: usize = 200;

/// Default maximum rationale length attached to spans and score records
pub const DEFAULT_MAX_RATIONALE_CHARS: usize = 1000;

/// Evaluation run configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalConfig {
    /// Characters of the item input previewed on the item span
    pub input_preview_chars: usize,

    /// Rationale text is cut to this many characters before export
    pub max_rationale_chars: usize,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            input_preview_chars: DEFAULT_INPUT_PREVIEW_CHARS,
            max_rationale_chars: DEFAULT_MAX_RATIONALE_CHARS,
        }
    }
}

impl EvalConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(source: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(source)
    }

    /// Defaults overridden by `TRACEVAL_INPUT_PREVIEW_CHARS` and
    /// `TRACEVAL_MAX_RATIONALE_CHARS`
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment overrides on top of this config
    ///
    /// Unparseable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(chars) = env_usize("TRACEVAL_INPUT_PREVIEW_CHARS") {
            self.input_preview_chars = chars;
        }
        if let Some(chars) = env_usize("TRACEVAL_MAX_RATIONALE_CHARS") {
            self.max_rationale_chars = chars;
        }
        self
    }
}

fn env_usize(key: &str) -> Option<usize> {
    env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
