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


//! Scorer capability contract

use crate::dataset::{value_to_text, EvalDatum};
use serde_json::Value;

/// Arguments handed to a scorer, each rendered as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScorerArgs {
    pub input: String,
    pub output: String,
    /// Omitted when the datum has no expected value
    pub expected: Option<String>,
}

impl ScorerArgs {
    pub fn new(input: &Value, output: &Value, expected: Option<&Value>) -> Self {
        Self {
            input: value_to_text(input),
            output: value_to_text(output),
            expected: expected.map(value_to_text),
        }
    }

    pub fn for_datum(datum: &EvalDatum, output: &Value) -> Self {
        Self::new(&datum.input, output, datum.expected.as_ref())
    }
}

/// A pluggable evaluator for one task output
///
/// The result may take any shape; it is normalized by
/// [`adapt_score`](crate::adapter::adapt_score) before it is recorded.
pub trait Scorer: Send + Sync {
    /// Identity used for span naming and result keying
    fn name(&self) -> &str;

    /// Judge one output
    fn score(&self, args: &ScorerArgs) -> anyhow::Result<Value>;
}

/// A scorer backed by a closure
pub struct FnScorer<F> {
    name: String,
    func: F,
}

impl<F> FnScorer<F>
where
    F: Fn(&ScorerArgs) -> anyhow::Result<Value> + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Scorer for FnScorer<F>
where
    F: Fn(&ScorerArgs) -> anyhow::Result<Value> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, args: &ScorerArgs) -> anyhow::Result<Value> {
        (self.func)(args)
    }
}

impl<F> std::fmt::Debug for FnScorer<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnScorer").field("name", &self.name).finish()
    }
}
