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


//! Tracing seam used by the evaluation runner
//!
//! The runner only needs to open named spans under a parent, annotate them,
//! mark them failed, read their identity and end them. Backends implement
//! [`EvalTracer`]; the OpenTelemetry backend lives in `traceval-observability`.

use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};

/// Trace and span identifiers of an open span, lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SpanIdentity {
    pub trace_id: String,
    pub span_id: String,
}

impl SpanIdentity {
    pub fn new(trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        Self {
            trace_id: trace_id.into(),
            span_id: span_id.into(),
        }
    }

    /// Identity reported by spans that are not recorded
    pub fn invalid() -> Self {
        Self::new("0".repeat(32), "0".repeat(16))
    }
}

/// Final status of a span
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SpanStatus {
    #[default]
    Unset,
    Error(String),
}

/// One open span
pub trait EvalSpan: Send {
    fn set_attribute(&mut self, attribute: KeyValue);

    /// Mark the span failed
    fn set_error(&mut self, message: &str);

    /// Attach an exception event
    fn record_exception(&mut self, error: &anyhow::Error);

    fn identity(&self) -> SpanIdentity;

    /// End the span. Later calls are ignored.
    fn end(&mut self);
}

/// Span factory
pub trait EvalTracer: Send + Sync {
    type Span: EvalSpan;

    /// Open a span; without a parent it becomes a child of whatever context
    /// the backend considers active
    fn start_span(
        &self,
        name: &str,
        parent: Option<&Self::Span>,
        attributes: Vec<KeyValue>,
    ) -> Self::Span;

    /// Open a span wrapped in a guard that ends it on drop
    fn start_guarded(
        &self,
        name: &str,
        parent: Option<&SpanGuard<Self::Span>>,
        attributes: Vec<KeyValue>,
    ) -> SpanGuard<Self::Span>
    where
        Self: Sized,
    {
        SpanGuard::new(self.start_span(name, parent.map(SpanGuard::span), attributes))
    }
}

/// Ends the wrapped span when dropped, including during unwinding
pub struct SpanGuard<S: EvalSpan> {
    span: S,
}

impl<S: EvalSpan> SpanGuard<S> {
    pub fn new(span: S) -> Self {
        Self { span }
    }

    pub fn span(&self) -> &S {
        &self.span
    }

    pub fn set_attribute(&mut self, attribute: KeyValue) {
        self.span.set_attribute(attribute);
    }

    pub fn set_error(&mut self, message: &str) {
        self.span.set_error(message);
    }

    pub fn record_exception(&mut self, error: &anyhow::Error) {
        self.span.record_exception(error);
    }

    pub fn identity(&self) -> SpanIdentity {
        self.span.identity()
    }

    /// End the span now
    pub fn end(self) {
        drop(self);
    }
}

impl<S: EvalSpan> Drop for SpanGuard<S> {
    fn drop(&mut self) {
        self.span.end();
    }
}

/// Tracer that records nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTracer;

/// Span produced by [`NoopTracer`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSpan;

impl EvalSpan for NoopSpan {
    fn set_attribute(&mut self, _attribute: KeyValue) {}

    fn set_error(&mut self, _message: &str) {}

    fn record_exception(&mut self, _error: &anyhow::Error) {}

    fn identity(&self) -> SpanIdentity {
        SpanIdentity::invalid()
    }

    fn end(&mut self) {}
}

impl EvalTracer for NoopTracer {
    type Span = NoopSpan;

    fn start_span(
        &self,
        _name: &str,
        _parent: Option<&NoopSpan>,
        _attributes: Vec<KeyValue>,
    ) -> NoopSpan {
        NoopSpan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryTracer;

    #[test]
    fn test_guard_ends_span_on_drop() {
        let tracer = InMemoryTracer::new();
        {
            let _guard = tracer.start_guarded("scoped", None, vec![]);
            assert!(tracer.finished_spans().is_empty());
        }
        let spans = tracer.finished_spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "scoped");
    }

    #[test]
    fn test_guard_ends_span_during_unwind() {
        let tracer = InMemoryTracer::new();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = tracer.start_guarded("panicking", None, vec![]);
            panic!("task exploded");
        }));
        assert!(result.is_err());
        assert_eq!(tracer.finished_spans().len(), 1);
    }

    #[test]
    fn test_explicit_end_ends_once() {
        let tracer = InMemoryTracer::new();
        let guard = tracer.start_guarded("explicit", None, vec![]);
        guard.end();
        assert_eq!(tracer.finished_spans().len(), 1);
    }

    #[test]
    fn test_invalid_identity_shape() {
        let identity = NoopTracer.start_span("x", None, vec![]).identity();
        assert_eq!(identity.trace_id.len(), 32);
        assert_eq!(identity.span_id.len(), 16);
    }
}
