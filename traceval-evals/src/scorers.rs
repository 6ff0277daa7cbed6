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


//! Built-in reference scorers
//!
//! Deterministic comparisons against the datum's expected value. Each returns
//! a different native shape; the orchestrator's adapter normalizes them.
//! Without an expected value they answer with the `no_reference` label so
//! they never contribute to averages.

use crate::scorer::{Scorer, ScorerArgs};
use anyhow::Context;
use serde_json::{json, Value};

/// Label returned when a datum carries no expected value
pub const NO_REFERENCE: &str = "no_reference";

fn no_reference() -> Value {
    json!({
        "label": NO_REFERENCE,
        "explanation": "datum has no expected value",
    })
}

/// 1.0 when output equals expected, else 0.0
#[derive(Debug, Clone)]
pub struct ExactMatch {
    name: String,
    trim: bool,
    ignore_case: bool,
}

impl ExactMatch {
    pub fn new() -> Self {
        Self {
            name: "exact_match".to_string(),
            trim: true,
            ignore_case: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Compare without surrounding whitespace (default: true)
    pub fn trim(mut self, enabled: bool) -> Self {
        self.trim = enabled;
        self
    }

    /// Compare case-insensitively (default: false)
    pub fn ignore_case(mut self, enabled: bool) -> Self {
        self.ignore_case = enabled;
        self
    }

    fn normalize(&self, text: &str) -> String {
        let text = if self.trim { text.trim() } else { text };
        if self.ignore_case {
            text.to_lowercase()
        } else {
            text.to_string()
        }
    }
}

impl Default for ExactMatch {
    fn default() -> Self {
        Self::new()
    }
}

impl Scorer for ExactMatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, args: &ScorerArgs) -> anyhow::Result<Value> {
        let Some(expected) = args.expected.as_deref() else {
            return Ok(no_reference());
        };
        let value = if self.normalize(&args.output) == self.normalize(expected) {
            1.0
        } else {
            0.0
        };
        Ok(json!({
            "name": self.name,
            "value": value,
        }))
    }
}

/// 1.0 when the expected text appears anywhere in the output
#[derive(Debug, Clone)]
pub struct Contains {
    name: String,
}

impl Contains {
    pub fn new() -> Self {
        Self {
            name: "contains".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Default for Contains {
    fn default() -> Self {
        Self::new()
    }
}

impl Scorer for Contains {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, args: &ScorerArgs) -> anyhow::Result<Value> {
        match args.expected.as_deref() {
            Some(expected) if args.output.contains(expected) => Ok(json!(1.0)),
            Some(_) => Ok(json!(0.0)),
            None => Ok(no_reference()),
        }
    }
}

/// Compares one field of a JSON object output against the expected text
///
/// Fails when the output is not a JSON object.
#[derive(Debug, Clone)]
pub struct JsonFieldMatch {
    name: String,
    field: String,
}

impl JsonFieldMatch {
    pub fn new(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            name: format!("json_field_{}", field),
            field,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Scorer for JsonFieldMatch {
    fn name(&self) -> &str {
        &self.name
    }

    fn score(&self, args: &ScorerArgs) -> anyhow::Result<Value> {
        let Some(expected) = args.expected.as_deref() else {
            return Ok(no_reference());
        };

        let output: Value =
            serde_json::from_str(&args.output).context("output is not valid JSON")?;
        let object = output
            .as_object()
            .context("output is not a JSON object")?;

        let (score, rationale) = match object.get(&self.field) {
            None => (0.0, format!("field '{}' missing from output", self.field)),
            Some(actual) => {
                let actual = crate::dataset::value_to_text(actual);
                if actual == expected {
                    (1.0, format!("field '{}' matches", self.field))
                } else {
                    (
                        0.0,
                        format!("field '{}' is '{}', expected '{}'", self.field, actual, expected),
                    )
                }
            }
        };

        Ok(json!({
            "score": score,
            "rationale": rationale,
            "metadata": { "field": self.field },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::adapt_score;

    fn args(output: &str, expected: Option<&str>) -> ScorerArgs {
        ScorerArgs {
            input: "q".to_string(),
            output: output.to_string(),
            expected: expected.map(str::to_string),
        }
    }

    fn adapted(scorer: &dyn Scorer, args: &ScorerArgs) -> crate::Score {
        adapt_score(scorer.name(), &scorer.score(args).unwrap())
    }

    #[test]
    fn test_exact_match_trims_by_default() {
        let scorer = ExactMatch::new();
        assert_eq!(adapted(&scorer, &args(" 4\n", Some("4"))).value, Some(1.0));
        assert_eq!(adapted(&scorer, &args("5", Some("4"))).value, Some(0.0));
    }

    #[test]
    fn test_exact_match_case_folding() {
        let strict = ExactMatch::new();
        let folded = ExactMatch::new().ignore_case(true).with_name("exact_ci");
        assert_eq!(adapted(&strict, &args("Paris", Some("paris"))).value, Some(0.0));

        let score = adapted(&folded, &args("Paris", Some("paris")));
        assert_eq!(score.name, "exact_ci");
        assert_eq!(score.value, Some(1.0));
    }

    #[test]
    fn test_missing_reference_is_label_only() {
        let score = adapted(&Contains::new(), &args("anything", None));
        assert_eq!(score.value, None);
        assert_eq!(score.label.as_deref(), Some(NO_REFERENCE));
        assert!(score.is_answered());
    }

    #[test]
    fn test_contains() {
        let scorer = Contains::new();
        assert_eq!(adapted(&scorer, &args("the answer is 4", Some("4"))).value, Some(1.0));
        assert_eq!(adapted(&scorer, &args("no idea", Some("4"))).value, Some(0.0));
    }

    #[test]
    fn test_json_field_match() {
        let scorer = JsonFieldMatch::new("city");
        assert_eq!(scorer.name(), "json_field_city");

        let score = adapted(&scorer, &args(r#"{"city": "Paris"}"#, Some("Paris")));
        assert_eq!(score.value, Some(1.0));
        assert_eq!(score.metadata.unwrap()["field"], "city");

        let score = adapted(&scorer, &args(r#"{"country": "FR"}"#, Some("Paris")));
        assert_eq!(score.value, Some(0.0));
        assert!(score.rationale.unwrap().contains("missing"));
    }

    #[test]
    fn test_json_field_match_rejects_non_json_output() {
        let scorer = JsonFieldMatch::new("city");
        let err = scorer.score(&args("Paris", Some("Paris"))).unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
        assert!(scorer.score(&args("[1]", Some("Paris"))).is_err());
    }
}
