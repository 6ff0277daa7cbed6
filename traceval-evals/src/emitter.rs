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


//! Score emission seam
//!
//! After an item has been scored, each recorded [`Score`] is handed to a
//! [`ScoreSink`] as a [`ScoreRecord`] tagged with the span it belongs to.

use crate::conventions::{truncate_chars, EVAL_SOURCE};
use crate::result::Score;
use crate::tracer::SpanIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A score on its way out of the process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub name: String,
    /// Absent for label-only scores
    pub value: Option<f64>,
    pub trace_id: String,
    pub span_id: String,
    pub label: Option<String>,
    /// Already truncated
    pub rationale: Option<String>,
    pub source: Option<String>,
    pub metadata: Map<String, Value>,
}

impl ScoreRecord {
    /// Record for a score produced by an evaluation run
    ///
    /// Tags the record with `source = "eval"` and the `eval_name` /
    /// `item_index` metadata, and cuts the rationale to `max_rationale_chars`.
    pub fn for_eval_item(
        score: &Score,
        identity: &SpanIdentity,
        eval_name: &str,
        item_index: usize,
        max_rationale_chars: usize,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert("eval_name".to_string(), Value::from(eval_name));
        metadata.insert("item_index".to_string(), Value::from(item_index));

        Self {
            name: score.name.clone(),
            value: score.value,
            trace_id: identity.trace_id.clone(),
            span_id: identity.span_id.clone(),
            label: score.label.clone(),
            rationale: score
                .rationale
                .as_deref()
                .map(|text| truncate_chars(text, max_rationale_chars)),
            source: Some(EVAL_SOURCE.to_string()),
            metadata,
        }
    }
}

/// Errors a sink may report
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("Score rejected: {0}")]
    Rejected(String),

    #[error("Invalid span identity: {0}")]
    InvalidIdentity(String),

    #[error("Emission failed: {0:#}")]
    Other(#[from] anyhow::Error),
}

/// Turns a score into a terminal observability record
pub trait ScoreSink: Send + Sync {
    fn emit(&self, record: &ScoreRecord) -> Result<(), EmitError>;
}

/// Sink that drops every record
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopScoreSink;

impl ScoreSink for NoopScoreSink {
    fn emit(&self, _record: &ScoreRecord) -> Result<(), EmitError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_tags_and_truncates() {
        let score = Score::new("judge")
            .with_value(0.5)
            .with_label("B")
            .with_rationale("a".repeat(50));
        let identity = SpanIdentity::new("ab".repeat(16), "cd".repeat(8));

        let record = ScoreRecord::for_eval_item(&score, &identity, "qa", 3, 10);
        assert_eq!(record.name, "judge");
        assert_eq!(record.value, Some(0.5));
        assert_eq!(record.trace_id, identity.trace_id);
        assert_eq!(record.span_id, identity.span_id);
        assert_eq!(record.rationale.as_deref(), Some("aaaaaaaaaa"));
        assert_eq!(record.source.as_deref(), Some("eval"));
        assert_eq!(Value::Object(record.metadata), json!({"eval_name": "qa", "item_index": 3}));
    }

    #[test]
    fn test_emit_error_display() {
        let err = EmitError::Rejected("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Score rejected: quota exceeded");
    }
}
