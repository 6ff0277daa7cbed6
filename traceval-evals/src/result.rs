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


//! Result contracts produced by an evaluation run

use crate::conventions::truncate_chars;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Canonical result of one scorer on one item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Score {
    /// Scorer identity, used as the aggregation key
    pub name: String,

    /// Primary aggregable signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Categorical outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Free-text justification
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,

    /// Auxiliary data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Score {
    /// An empty score for `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            label: None,
            rationale: None,
            metadata: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Whether the scorer produced a usable answer (a value or a label)
    pub fn is_answered(&self) -> bool {
        self.value.is_some() || self.label.is_some()
    }
}

/// Outcome of one dataset item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalResult {
    pub input: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,

    /// Task output; present only when the task succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,

    /// Scores keyed by scorer name, in first-recorded order
    #[serde(default)]
    pub scores: IndexMap<String, Score>,

    /// Task failure text; present only when the task failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvalResult {
    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Final state of an evaluation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalSummary {
    pub name: String,

    /// One result per datum, in dataset order
    pub results: Vec<EvalResult>,

    /// Mean numeric value per scorer; scorers without any numeric value are absent
    pub averages: BTreeMap<String, f64>,

    pub total: usize,

    pub errors: usize,
}

impl EvalSummary {
    /// Build the summary from the ordered results, computing averages
    pub fn from_results(name: impl Into<String>, results: Vec<EvalResult>) -> Self {
        let averages = compute_averages(&results);
        let errors = results.iter().filter(|r| r.is_error()).count();
        Self {
            name: name.into(),
            total: results.len(),
            results,
            averages,
            errors,
        }
    }

    /// Cut every score rationale to at most `max_chars` characters
    pub fn with_bounded_rationales(mut self, max_chars: usize) -> Self {
        for score in self.results.iter_mut().flat_map(|r| r.scores.values_mut()) {
            if let Some(rationale) = score.rationale.as_mut() {
                *rationale = truncate_chars(rationale, max_chars);
            }
        }
        self
    }
}

/// Arithmetic mean of every numeric score value, grouped by scorer name
pub fn compute_averages(results: &[EvalResult]) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for score in results.iter().flat_map(|r| r.scores.values()) {
        if let Some(value) = score.value {
            let entry = totals.entry(score.name.clone()).or_insert((0.0, 0));
            entry.0 += value;
            entry.1 += 1;
        }
    }

    totals
        .into_iter()
        .map(|(name, (sum, count))| (name, sum / count as f64))
        .collect()
}
