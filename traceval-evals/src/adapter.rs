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


//! Score-shape adapter
//!
//! Scorers may return whatever their native shape is: a canonical [`Score`], a
//! `{score, choice}` record, a `{label, explanation}` judgement, a bare number,
//! or an arbitrary object. [`adapt_score`] normalizes all of them into one
//! [`Score`] and never fails.
//!
//! Shapes are recognized by an ordered rule table; the first matching rule
//! wins and anything unrecognized degrades to `metadata.raw`.

use crate::dataset::value_to_text;
use crate::result::Score;
use serde_json::{Map, Value};
use tracing::trace;

/// Fields consumed by the generic object rule and excluded from its metadata
const CONSUMED_FIELDS: [&str; 5] = ["value", "score", "label", "rationale", "explanation"];

/// Top-level fields of a canonical score
const CANONICAL_FIELDS: [&str; 5] = ["name", "value", "label", "rationale", "metadata"];

/// Recognized scorer result shapes, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScoreShape {
    /// Already a canonical score: textual `name` plus a `value` or `label`.
    /// Other top-level fields, and a `metadata` that is not an object, are
    /// kept in the score's metadata.
    Canonical,
    /// Numeric `score` with optional `choice`/`label`, `rationale`, `metadata`
    NumericScore,
    /// Textual `label` and `explanation`
    LabelExplanation,
    /// A bare number
    Number,
    /// Any other JSON object
    Object,
    /// Nothing recognizable
    Unrecognized,
}

struct ShapeRule {
    shape: ScoreShape,
    matches: fn(&Value) -> bool,
    map: fn(&str, &Value) -> Score,
}

const RULES: &[ShapeRule] = &[
    ShapeRule {
        shape: ScoreShape::Canonical,
        matches: is_canonical,
        map: map_canonical,
    },
    ShapeRule {
        shape: ScoreShape::NumericScore,
        matches: is_numeric_score,
        map: map_numeric_score,
    },
    ShapeRule {
        shape: ScoreShape::LabelExplanation,
        matches: is_label_explanation,
        map: map_label_explanation,
    },
    ShapeRule {
        shape: ScoreShape::Number,
        matches: Value::is_number,
        map: map_number,
    },
    ShapeRule {
        shape: ScoreShape::Object,
        matches: Value::is_object,
        map: map_object,
    },
];

/// Normalize a raw scorer result into a [`Score`] named after the scorer
///
/// The declared `name` always replaces any name embedded in `raw`.
pub fn adapt_score(name: &str, raw: &Value) -> Score {
    let shape = classify(raw);
    trace!(scorer = name, ?shape, "Adapting scorer result");

    RULES
        .iter()
        .find(|rule| rule.shape == shape)
        .map(|rule| (rule.map)(name, raw))
        .unwrap_or_else(|| map_unrecognized(name, raw))
}

/// Which rule [`adapt_score`] would apply to `raw`
pub(crate) fn classify(raw: &Value) -> ScoreShape {
    RULES
        .iter()
        .find(|rule| (rule.matches)(raw))
        .map(|rule| rule.shape)
        .unwrap_or(ScoreShape::Unrecognized)
}

fn number_field(raw: &Value, key: &str) -> Option<f64> {
    raw.get(key).and_then(Value::as_f64)
}

fn text_field(raw: &Value, key: &str) -> Option<String> {
    raw.get(key).and_then(Value::as_str).map(str::to_string)
}

fn object_field(raw: &Value, key: &str) -> Option<Map<String, Value>> {
    raw.get(key).and_then(Value::as_object).cloned()
}

fn is_canonical(raw: &Value) -> bool {
    raw.is_object()
        && raw.get("name").is_some_and(Value::is_string)
        && (number_field(raw, "value").is_some() || text_field(raw, "label").is_some())
}

fn map_canonical(name: &str, raw: &Value) -> Score {
    let mut metadata = object_field(raw, "metadata");

    let mut extras: Map<String, Value> = raw
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(key, _)| !CANONICAL_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();
    match raw.get("metadata") {
        None | Some(Value::Null) | Some(Value::Object(_)) => {}
        Some(other) => {
            extras.insert("metadata".to_string(), other.clone());
        }
    }

    if !extras.is_empty() {
        metadata.get_or_insert_with(Map::new).extend(extras);
    }

    Score {
        name: name.to_string(),
        value: number_field(raw, "value"),
        label: text_field(raw, "label"),
        rationale: text_field(raw, "rationale"),
        metadata,
    }
}

fn is_numeric_score(raw: &Value) -> bool {
    raw.is_object() && number_field(raw, "score").is_some()
}

fn map_numeric_score(name: &str, raw: &Value) -> Score {
    Score {
        name: name.to_string(),
        value: number_field(raw, "score"),
        label: text_field(raw, "choice").or_else(|| text_field(raw, "label")),
        rationale: text_field(raw, "rationale"),
        metadata: Some(object_field(raw, "metadata").unwrap_or_default()),
    }
}

fn is_label_explanation(raw: &Value) -> bool {
    raw.is_object() && text_field(raw, "label").is_some() && text_field(raw, "explanation").is_some()
}

fn map_label_explanation(name: &str, raw: &Value) -> Score {
    Score {
        name: name.to_string(),
        value: number_field(raw, "score"),
        label: text_field(raw, "label"),
        rationale: text_field(raw, "explanation"),
        metadata: None,
    }
}

fn map_number(name: &str, raw: &Value) -> Score {
    Score {
        value: raw.as_f64(),
        ..Score::new(name)
    }
}

fn map_object(name: &str, raw: &Value) -> Score {
    let remaining: Map<String, Value> = raw
        .as_object()
        .map(|fields| {
            fields
                .iter()
                .filter(|(key, _)| !CONSUMED_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    Score {
        name: name.to_string(),
        value: number_field(raw, "value").or_else(|| number_field(raw, "score")),
        label: text_field(raw, "label"),
        rationale: text_field(raw, "rationale").or_else(|| text_field(raw, "explanation")),
        metadata: Some(remaining),
    }
}

fn map_unrecognized(name: &str, raw: &Value) -> Score {
    let mut metadata = Map::new();
    metadata.insert("raw".to_string(), Value::String(value_to_text(raw)));
    Score::new(name).with_metadata(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_plain_number() {
        let score = adapt_score("similarity", &json!(0.75));
        assert_eq!(score, Score::new("similarity").with_value(0.75));
        assert_eq!(classify(&json!(0.75)), ScoreShape::Number);
    }

    #[test]
    fn test_numeric_score_with_choice() {
        let score = adapt_score("judge", &json!({"score": 0.8, "choice": "B", "rationale": "because"}));
        assert_eq!(
            score,
            Score::new("judge")
                .with_value(0.8)
                .with_label("B")
                .with_rationale("because")
                .with_metadata(Map::new())
        );
    }

    #[test]
    fn test_numeric_score_falls_back_to_label_and_keeps_metadata() {
        let score = adapt_score(
            "judge",
            &json!({"score": 1, "label": "pass", "metadata": {"model": "m1"}}),
        );
        assert_eq!(score.value, Some(1.0));
        assert_eq!(score.label.as_deref(), Some("pass"));
        assert_eq!(score.metadata, Some(json!({"model": "m1"}).as_object().cloned().unwrap()));
    }

    #[test]
    fn test_label_explanation() {
        let raw = json!({"label": "factual", "explanation": "matches source"});
        assert_eq!(classify(&raw), ScoreShape::LabelExplanation);

        let score = adapt_score("hallucination", &raw);
        assert_eq!(score.value, None);
        assert_eq!(score.label.as_deref(), Some("factual"));
        assert_eq!(score.rationale.as_deref(), Some("matches source"));
        assert_eq!(score.metadata, None);
    }

    #[test]
    fn test_canonical_name_is_replaced_by_scorer_name() {
        let raw = json!({"name": "inner", "value": 1.0, "rationale": "ok"});
        assert_eq!(classify(&raw), ScoreShape::Canonical);

        let score = adapt_score("outer", &raw);
        assert_eq!(score, Score::new("outer").with_value(1.0).with_rationale("ok"));
    }

    #[test]
    fn test_canonical_requires_value_or_label() {
        let raw = json!({"name": "inner", "rationale": "none"});
        assert_eq!(classify(&raw), ScoreShape::Object);

        let score = adapt_score("outer", &raw);
        assert_eq!(score.name, "outer");
        assert_eq!(score.rationale.as_deref(), Some("none"));
        assert_eq!(score.metadata, Some(json!({"name": "inner"}).as_object().cloned().unwrap()));
    }

    #[test]
    fn test_generic_object_collects_remaining_fields_in_order() {
        let raw = json!({
            "zeta": true,
            "value": 0.4,
            "explanation": "close",
            "alpha": [1, 2],
            "score": "high"
        });
        assert_eq!(classify(&raw), ScoreShape::Object);

        let score = adapt_score("custom", &raw);
        assert_eq!(score.value, Some(0.4));
        assert_eq!(score.rationale.as_deref(), Some("close"));

        let metadata = score.metadata.unwrap();
        let keys: Vec<&str> = metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_numeric_score_wins_over_generic_object() {
        let raw = json!({"value": 0.4, "score": 0.9, "explanation": "close", "zeta": true});
        assert_eq!(classify(&raw), ScoreShape::NumericScore);

        let score = adapt_score("custom", &raw);
        assert_eq!(score.value, Some(0.9));
        assert_eq!(score.rationale, None);
        assert_eq!(score.metadata, Some(Map::new()));
    }

    #[test]
    fn test_canonical_keeps_unknown_fields_in_metadata() {
        let raw = json!({"name": "s", "value": 1.0, "extra": "kept", "metadata": "notobj"});
        assert_eq!(classify(&raw), ScoreShape::Canonical);

        let score = adapt_score("s", &raw);
        assert_eq!(score.value, Some(1.0));
        assert_eq!(
            score.metadata,
            Some(json!({"extra": "kept", "metadata": "notobj"}).as_object().cloned().unwrap())
        );
    }

    #[test]
    fn test_canonical_extras_follow_existing_metadata() {
        let raw = json!({"name": "s", "label": "ok", "metadata": {"model": "m1"}, "latency_ms": 12});
        let score = adapt_score("s", &raw);
        let metadata = score.metadata.unwrap();
        let keys: Vec<&str> = metadata.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["model", "latency_ms"]);
    }

    #[test]
    fn test_generic_object_value_falls_back_to_score() {
        let score = adapt_score("custom", &json!({"score": "high", "value": null, "passes": 3}));
        assert_eq!(score.value, None);
        assert_eq!(score.metadata, Some(json!({"passes": 3}).as_object().cloned().unwrap()));
    }

    #[test]
    fn test_unrecognized_shapes_fall_back_to_raw() {
        for (raw, rendered) in [
            (json!("yes"), "yes"),
            (json!(true), "true"),
            (json!([1, 2]), "[1,2]"),
            (Value::Null, "null"),
        ] {
            assert_eq!(classify(&raw), ScoreShape::Unrecognized);
            let score = adapt_score("odd", &raw);
            assert_eq!(score.value, None);
            assert_eq!(score.label, None);
            assert_eq!(score.rationale, None);
            assert_eq!(score.metadata.unwrap()["raw"], json!(rendered));
        }
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            (-1000i64..1000).prop_map(|n| json!(n)),
            (-1.0e6f64..1.0e6).prop_map(|f| json!(f)),
            prop_oneof![
                Just("name".to_string()),
                Just("value".to_string()),
                Just("score".to_string()),
                Just("label".to_string()),
                "[a-z]{0,6}",
            ]
            .prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(
                    (
                        prop_oneof![
                            Just("name".to_string()),
                            Just("value".to_string()),
                            Just("score".to_string()),
                            Just("label".to_string()),
                            Just("choice".to_string()),
                            Just("explanation".to_string()),
                            Just("rationale".to_string()),
                            Just("metadata".to_string()),
                            "[a-z]{1,6}",
                        ],
                        inner
                    ),
                    0..6
                )
                .prop_map(|pairs| Value::Object(pairs.into_iter().collect())),
            ]
        })
    }

    fn arb_canonical() -> impl Strategy<Value = Score> {
        (
            prop::option::of(-1.0e6f64..1.0e6),
            prop::option::of("[a-z]{1,8}"),
            prop::option::of("[a-z ]{0,20}"),
            prop::option::of(prop::collection::vec(("[a-z]{1,4}", any::<i32>()), 0..3)),
        )
            .prop_filter("answered", |(value, label, _, _)| value.is_some() || label.is_some())
            .prop_map(|(value, label, rationale, metadata)| Score {
                name: "scorer".to_string(),
                value,
                label,
                rationale,
                metadata: metadata
                    .map(|pairs| pairs.into_iter().map(|(k, v)| (k, json!(v))).collect()),
            })
    }

    proptest! {
        #[test]
        fn prop_adapter_is_deterministic_and_keeps_scorer_name(raw in arb_json()) {
            let first = adapt_score("scorer", &raw);
            let second = adapt_score("scorer", &raw);
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.name.as_str(), "scorer");
        }

        #[test]
        fn prop_canonical_scores_pass_through_unchanged(score in arb_canonical()) {
            let raw = serde_json::to_value(&score).unwrap();
            prop_assert_eq!(adapt_score("scorer", &raw), score);
        }
    }
}
