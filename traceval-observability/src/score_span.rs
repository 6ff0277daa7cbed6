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


//! Score emission as OpenTelemetry spans
//!
//! Each record becomes a zero-length `score <name>` span whose parent is the
//! span identity carried by the record, so backends show the score under the
//! evaluation item it judged.

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{
    Span, SpanContext, SpanId, TraceContextExt, TraceFlags, TraceId, TraceState, Tracer,
};
use opentelemetry::{Context, KeyValue};
use serde_json::Value;
use traceval_evals::conventions::{keys, span_name, SpanKind};
use traceval_evals::{EmitError, ScoreRecord, ScoreSink};

use crate::INSTRUMENTATION_NAME;

/// [`ScoreSink`] that writes every record as a terminal span
pub struct SpanScoreEmitter<T = BoxedTracer> {
    tracer: T,
}

impl SpanScoreEmitter<BoxedTracer> {
    pub fn global() -> Self {
        Self::new(global::tracer(INSTRUMENTATION_NAME))
    }
}

impl<T> SpanScoreEmitter<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }
}

impl<T> ScoreSink for SpanScoreEmitter<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    fn emit(&self, record: &ScoreRecord) -> Result<(), EmitError> {
        let parent_cx = parent_context(record)?;

        let mut span = self
            .tracer
            .span_builder(span_name(SpanKind::Score, &record.name))
            .with_attributes(score_attributes(record))
            .start_with_context(&self.tracer, &parent_cx);
        span.end();

        Ok(())
    }
}

/// Rebuild the tagged span as a remote parent
fn parent_context(record: &ScoreRecord) -> Result<Context, EmitError> {
    let trace_id = TraceId::from_hex(&record.trace_id).map_err(|e| {
        EmitError::InvalidIdentity(format!("trace id '{}': {}", record.trace_id, e))
    })?;
    let span_id = SpanId::from_hex(&record.span_id).map_err(|e| {
        EmitError::InvalidIdentity(format!("span id '{}': {}", record.span_id, e))
    })?;

    if trace_id == TraceId::INVALID || span_id == SpanId::INVALID {
        return Err(EmitError::InvalidIdentity(format!(
            "score '{}' is tagged with an unrecorded span",
            record.name
        )));
    }

    let span_context = SpanContext::new(
        trace_id,
        span_id,
        TraceFlags::SAMPLED,
        true,
        TraceState::default(),
    );
    Ok(Context::new().with_remote_span_context(span_context))
}

/// Attributes of a score span
pub fn score_attributes(record: &ScoreRecord) -> Vec<KeyValue> {
    let mut attributes = vec![
        KeyValue::new(keys::SPAN_KIND, SpanKind::Score.as_str()),
        KeyValue::new(keys::SCORER_NAME, record.name.clone()),
        KeyValue::new(keys::SCORE_TRACE_ID, record.trace_id.clone()),
        KeyValue::new(keys::SCORE_SPAN_ID, record.span_id.clone()),
    ];

    if let Some(value) = record.value {
        attributes.push(KeyValue::new(keys::SCORE_VALUE, value));
    }
    if let Some(label) = &record.label {
        attributes.push(KeyValue::new(keys::SCORE_LABEL, label.clone()));
    }
    if let Some(rationale) = &record.rationale {
        attributes.push(KeyValue::new(keys::SCORE_RATIONALE, rationale.clone()));
    }
    if let Some(source) = &record.source {
        attributes.push(KeyValue::new(keys::SCORE_SOURCE, source.clone()));
    }

    for (key, value) in &record.metadata {
        attributes.push(KeyValue::new(
            format!("{}.{}", keys::SCORE_METADATA_PREFIX, key),
            attribute_value(value),
        ));
    }

    attributes
}

fn attribute_value(value: &Value) -> opentelemetry::Value {
    match value {
        Value::Bool(b) => (*b).into(),
        Value::Number(n) => match n.as_i64() {
            Some(i) => i.into(),
            None => n.as_f64().unwrap_or_default().into(),
        },
        Value::String(s) => s.clone().into(),
        other => other.to_string().into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_sdk::testing::trace::InMemorySpanExporter;
    use opentelemetry_sdk::trace::TracerProvider;
    use serde_json::{json, Map};

    fn record(trace_id: &str, span_id: &str) -> ScoreRecord {
        let mut metadata = Map::new();
        metadata.insert("eval_name".to_string(), json!("qa"));
        metadata.insert("item_index".to_string(), json!(3));
        metadata.insert("choices".to_string(), json!(["A", "B"]));

        ScoreRecord {
            name: "exact_match".to_string(),
            value: Some(1.0),
            trace_id: trace_id.to_string(),
            span_id: span_id.to_string(),
            label: Some("A".to_string()),
            rationale: Some("matched".to_string()),
            source: Some("eval".to_string()),
            metadata,
        }
    }

    #[test]
    fn test_score_attributes() {
        let attributes = score_attributes(&record("ab", "cd"));

        assert!(attributes.contains(&KeyValue::new(keys::SCORE_VALUE, 1.0)));
        assert!(attributes.contains(&KeyValue::new(keys::SCORE_LABEL, "A")));
        assert!(attributes.contains(&KeyValue::new(keys::SCORE_SOURCE, "eval")));
        assert!(attributes.contains(&KeyValue::new(
            "traceval.score.metadata.item_index",
            3i64
        )));
        assert!(attributes.contains(&KeyValue::new(
            "traceval.score.metadata.choices",
            r#"["A","B"]"#
        )));
    }

    #[test]
    fn test_label_only_record_has_no_value_attribute() {
        let mut rec = record("ab", "cd");
        rec.value = None;
        let attributes = score_attributes(&rec);
        assert!(!attributes.iter().any(|kv| kv.key.as_str() == keys::SCORE_VALUE));
    }

    #[test]
    fn test_emit_parents_score_span_on_tagged_span() {
        let exporter = InMemorySpanExporter::default();
        let provider = TracerProvider::builder()
            .with_simple_exporter(exporter.clone())
            .build();
        let emitter = SpanScoreEmitter::new(provider.tracer("test"));

        let trace_id = "4bf92f3577b34da6a3ce929d0e0e4736";
        let span_id = "00f067aa0ba902b7";
        emitter.emit(&record(trace_id, span_id)).unwrap();

        let spans = exporter.get_finished_spans().unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "score exact_match");
        assert_eq!(spans[0].span_context.trace_id().to_string(), trace_id);
        assert_eq!(spans[0].parent_span_id.to_string(), span_id);
    }

    #[test]
    fn test_emit_rejects_bad_identity() {
        let provider = TracerProvider::builder().build();
        let emitter = SpanScoreEmitter::new(provider.tracer("test"));

        let err = emitter.emit(&record("not-hex", "00f067aa0ba902b7")).unwrap_err();
        assert!(matches!(err, EmitError::InvalidIdentity(_)));

        let zeros = record(&"0".repeat(32), &"0".repeat(16));
        let err = emitter.emit(&zeros).unwrap_err();
        assert!(matches!(err, EmitError::InvalidIdentity(_)));
    }
}
