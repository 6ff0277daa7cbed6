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


//! In-memory collaborators
//!
//! A tracer, score sink and diagnostics channel that keep everything in
//! memory. Used by tests and by callers that want to inspect a run's span
//! tree without an exporter.

use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::emitter::{EmitError, ScoreRecord, ScoreSink};
use crate::tracer::{EvalSpan, EvalTracer, SpanIdentity, SpanStatus};
use opentelemetry::KeyValue;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A span that has ended
#[derive(Debug, Clone)]
pub struct RecordedSpan {
    pub name: String,
    pub identity: SpanIdentity,
    pub parent_span_id: Option<String>,
    pub attributes: Vec<KeyValue>,
    pub status: SpanStatus,
    /// Rendered exceptions, in recording order
    pub exceptions: Vec<String>,
}

impl RecordedSpan {
    /// Last value set for `key`
    pub fn attribute(&self, key: &str) -> Option<&opentelemetry::Value> {
        self.attributes
            .iter()
            .rev()
            .find(|kv| kv.key.as_str() == key)
            .map(|kv| &kv.value)
    }

    pub fn is_error(&self) -> bool {
        matches!(self.status, SpanStatus::Error(_))
    }
}

#[derive(Debug, Default)]
struct TracerState {
    next_id: AtomicU64,
    finished: Mutex<Vec<RecordedSpan>>,
}

impl TracerState {
    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// Tracer that keeps ended spans in memory, in the order they ended
#[derive(Debug, Clone, Default)]
pub struct InMemoryTracer {
    state: Arc<TracerState>,
}

impl InMemoryTracer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finished_spans(&self) -> Vec<RecordedSpan> {
        self.state.finished.lock().clone()
    }

    /// Ended spans whose name is exactly `name`
    pub fn spans_named(&self, name: &str) -> Vec<RecordedSpan> {
        self.state
            .finished
            .lock()
            .iter()
            .filter(|span| span.name == name)
            .cloned()
            .collect()
    }

    /// Ended spans whose parent is `parent_span_id`
    pub fn children_of(&self, parent_span_id: &str) -> Vec<RecordedSpan> {
        self.state
            .finished
            .lock()
            .iter()
            .filter(|span| span.parent_span_id.as_deref() == Some(parent_span_id))
            .cloned()
            .collect()
    }
}

/// Open span created by [`InMemoryTracer`]
#[derive(Debug)]
pub struct InMemorySpan {
    record: RecordedSpan,
    state: Arc<TracerState>,
    ended: bool,
}

impl EvalSpan for InMemorySpan {
    fn set_attribute(&mut self, attribute: KeyValue) {
        self.record.attributes.push(attribute);
    }

    fn set_error(&mut self, message: &str) {
        self.record.status = SpanStatus::Error(message.to_string());
    }

    fn record_exception(&mut self, error: &anyhow::Error) {
        self.record.exceptions.push(format!("{:#}", error));
    }

    fn identity(&self) -> SpanIdentity {
        self.record.identity.clone()
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            self.state.finished.lock().push(self.record.clone());
        }
    }
}

impl EvalTracer for InMemoryTracer {
    type Span = InMemorySpan;

    fn start_span(
        &self,
        name: &str,
        parent: Option<&InMemorySpan>,
        attributes: Vec<KeyValue>,
    ) -> InMemorySpan {
        let span_id = format!("{:016x}", self.state.allocate_id());
        let (trace_id, parent_span_id) = match parent {
            Some(parent) => (
                parent.record.identity.trace_id.clone(),
                Some(parent.record.identity.span_id.clone()),
            ),
            None => (format!("{:032x}", self.state.allocate_id()), None),
        };

        InMemorySpan {
            record: RecordedSpan {
                name: name.to_string(),
                identity: SpanIdentity::new(trace_id, span_id),
                parent_span_id,
                attributes,
                status: SpanStatus::Unset,
                exceptions: Vec::new(),
            },
            state: self.state.clone(),
            ended: false,
        }
    }
}

/// Score sink that stores records, optionally rejecting some scorer names
#[derive(Debug, Default)]
pub struct InMemoryScoreSink {
    records: Mutex<Vec<ScoreRecord>>,
    rejected_names: HashSet<String>,
}

impl InMemoryScoreSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every record whose name is in `names`
    pub fn rejecting<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            records: Mutex::new(Vec::new()),
            rejected_names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn records(&self) -> Vec<ScoreRecord> {
        self.records.lock().clone()
    }
}

impl ScoreSink for InMemoryScoreSink {
    fn emit(&self, record: &ScoreRecord) -> Result<(), EmitError> {
        if self.rejected_names.contains(&record.name) {
            return Err(EmitError::Rejected(format!("sink refuses '{}'", record.name)));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Diagnostics channel that stores every report
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    events: Mutex<Vec<Diagnostic>>,
}

impl RecordingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Diagnostic> {
        self.events.lock().clone()
    }
}

impl Diagnostics for RecordingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        self.events.lock().push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_share_trace_and_link_parent() {
        let tracer = InMemoryTracer::new();
        let mut root = tracer.start_span("root", None, vec![]);
        let mut child = tracer.start_span("child", Some(&root), vec![KeyValue::new("k", 1i64)]);
        child.end();
        root.end();

        let spans = tracer.finished_spans();
        assert_eq!(spans[0].name, "child");
        assert_eq!(spans[0].identity.trace_id, spans[1].identity.trace_id);
        assert_eq!(spans[0].parent_span_id.as_deref(), Some(spans[1].identity.span_id.as_str()));
        assert_eq!(spans[0].attribute("k"), Some(&opentelemetry::Value::I64(1)));
        assert!(spans[1].parent_span_id.is_none());
    }

    #[test]
    fn test_end_is_idempotent() {
        let tracer = InMemoryTracer::new();
        let mut span = tracer.start_span("once", None, vec![]);
        span.end();
        span.end();
        assert_eq!(tracer.finished_spans().len(), 1);
    }

    #[test]
    fn test_rejecting_sink() {
        let sink = InMemoryScoreSink::rejecting(["bad"]);
        let record = ScoreRecord {
            name: "bad".to_string(),
            value: Some(1.0),
            trace_id: String::new(),
            span_id: String::new(),
            label: None,
            rationale: None,
            source: None,
            metadata: Default::default(),
        };
        assert!(sink.emit(&record).is_err());
        assert!(sink.records().is_empty());
    }
}
