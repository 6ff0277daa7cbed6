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


//! Evaluation datasets

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of an evaluation dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalDatum {
    /// Passed verbatim to the task
    pub input: Value,

    /// Ground truth, if any. A JSON `null` reads as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,

    /// Any other fields on the row, preserved in their original order
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EvalDatum {
    /// Create a datum without ground truth
    pub fn new(input: impl Into<Value>) -> Self {
        Self {
            input: input.into(),
            expected: None,
            extra: Map::new(),
        }
    }

    /// Create a datum with an expected value
    pub fn with_expected(input: impl Into<Value>, expected: impl Into<Value>) -> Self {
        Self {
            input: input.into(),
            expected: Some(expected.into()),
            extra: Map::new(),
        }
    }

    /// Attach an extra field
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

type DatasetProducer = Box<dyn FnOnce() -> anyhow::Result<Vec<EvalDatum>> + Send>;

/// The data an evaluation iterates over
///
/// Either the rows themselves or a producer invoked once when the run starts.
pub enum Dataset {
    Items(Vec<EvalDatum>),
    Lazy(DatasetProducer),
}

impl Dataset {
    /// Defer building the rows until the run starts
    pub fn lazy<F>(producer: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<Vec<EvalDatum>> + Send + 'static,
    {
        Self::Lazy(Box::new(producer))
    }

    /// Materialize the rows, invoking the producer if there is one
    pub fn load(self) -> anyhow::Result<Vec<EvalDatum>> {
        match self {
            Self::Items(items) => Ok(items),
            Self::Lazy(producer) => producer(),
        }
    }
}

impl From<Vec<EvalDatum>> for Dataset {
    fn from(items: Vec<EvalDatum>) -> Self {
        Self::Items(items)
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Items(items) => f.debug_tuple("Items").field(&items.len()).finish(),
            Self::Lazy(_) => f.write_str("Lazy(..)"),
        }
    }
}

/// Render a value as text: strings verbatim, anything else as compact JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_datum_from_json_keeps_extra_fields_in_order() {
        let datum: EvalDatum = serde_json::from_value(json!({
            "input": "2+2?",
            "expected": "4",
            "zeta": 1,
            "alpha": 2
        }))
        .unwrap();

        assert_eq!(datum.input, json!("2+2?"));
        assert_eq!(datum.expected, Some(json!("4")));
        let keys: Vec<&str> = datum.extra.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_null_expected_is_absent() {
        let datum: EvalDatum =
            serde_json::from_value(json!({"input": {"q": 1}, "expected": null})).unwrap();
        assert_eq!(datum.expected, None);
    }

    #[test]
    fn test_lazy_dataset_invoked_once_on_load() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let dataset = Dataset::lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(vec![EvalDatum::new("a"), EvalDatum::new("b")])
        });
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let items = dataset.load().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("plain")), "plain");
        assert_eq!(value_to_text(&json!(4)), "4");
        assert_eq!(value_to_text(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
        assert_eq!(value_to_text(&Value::Null), "null");
    }
}
