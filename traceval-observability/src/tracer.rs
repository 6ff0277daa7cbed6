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


//! OpenTelemetry tracer initialization and the evaluation span backend
//!
//! [`init_tracer`] builds and installs a `TracerProvider` for the configured
//! exporter. [`OtelEvalTracer`] plugs any OpenTelemetry tracer into the
//! evaluation runner.

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{self, RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use opentelemetry_semantic_conventions as semconv;
use traceval_evals::{EvalSpan, EvalTracer, SpanIdentity};

use crate::config::{ExporterKind, ObservabilityConfig};
use crate::{ObservabilityError, INSTRUMENTATION_NAME};

/// Build the tracer provider for `config` and install it globally
///
/// With [`ExporterKind::None`] the provider still assigns real trace and span
/// ids, so score emissions can be correlated, but nothing leaves the process.
/// The OTLP exporter batches on the Tokio runtime and must be called from
/// inside one.
pub fn init_tracer(config: &ObservabilityConfig) -> Result<TracerProvider, ObservabilityError> {
    let resource = Resource::new(vec![
        KeyValue::new(
            semconv::resource::SERVICE_NAME,
            config.otel_service_name.clone(),
        ),
        KeyValue::new(semconv::resource::SERVICE_VERSION, env!("CARGO_PKG_VERSION")),
        KeyValue::new("telemetry.sdk.language", "rust"),
    ]);

    let trace_config = trace::Config::default()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
            config.sampling_rate,
        ))))
        .with_id_generator(RandomIdGenerator::default())
        .with_max_events_per_span(128)
        .with_max_attributes_per_span(128)
        .with_resource(resource);

    let tracer_provider = match config.effective_exporter() {
        ExporterKind::None => TracerProvider::builder().with_config(trace_config).build(),
        ExporterKind::Stdout => TracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .with_config(trace_config)
            .build(),
        ExporterKind::Otlp => {
            let exporter = opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(&config.otel_exporter_otlp_endpoint);

            opentelemetry_otlp::new_pipeline()
                .tracing()
                .with_exporter(exporter)
                .with_trace_config(trace_config)
                .install_batch(opentelemetry_sdk::runtime::Tokio)?
        }
    };

    global::set_tracer_provider(tracer_provider.clone());

    Ok(tracer_provider)
}

/// Shutdown the global tracer provider, flushing all pending spans
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// [`EvalTracer`] backed by an OpenTelemetry tracer
///
/// Defaults to the globally installed provider. Root spans (no parent
/// handle) are started under `Context::current()`, so a run nests inside
/// whatever span the caller has active.
pub struct OtelEvalTracer<T = BoxedTracer> {
    tracer: T,
}

impl OtelEvalTracer<BoxedTracer> {
    /// Tracer from the global provider
    pub fn global() -> Self {
        Self::new(global::tracer(INSTRUMENTATION_NAME))
    }
}

impl<T> OtelEvalTracer<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    pub fn new(tracer: T) -> Self {
        Self { tracer }
    }
}

impl<T> EvalTracer for OtelEvalTracer<T>
where
    T: Tracer + Send + Sync,
    T::Span: Send + Sync + 'static,
{
    type Span = OtelEvalSpan;

    fn start_span(
        &self,
        name: &str,
        parent: Option<&OtelEvalSpan>,
        attributes: Vec<KeyValue>,
    ) -> OtelEvalSpan {
        let parent_cx = parent
            .map(|span| span.cx.clone())
            .unwrap_or_else(Context::current);

        let span = self
            .tracer
            .span_builder(name.to_string())
            .with_attributes(attributes)
            .start_with_context(&self.tracer, &parent_cx);

        OtelEvalSpan {
            cx: parent_cx.with_span(span),
            ended: false,
        }
    }
}

/// An open evaluation span, carried as the context that holds it
pub struct OtelEvalSpan {
    cx: Context,
    ended: bool,
}

impl EvalSpan for OtelEvalSpan {
    fn set_attribute(&mut self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    fn set_error(&mut self, message: &str) {
        self.cx.span().set_status(Status::error(message.to_string()));
    }

    fn record_exception(&mut self, error: &anyhow::Error) {
        // `{:#}` keeps the whole cause chain in the event
        self.cx.span().add_event(
            "exception",
            vec![KeyValue::new(
                semconv::trace::EXCEPTION_MESSAGE,
                format!("{error:#}"),
            )],
        );
    }

    fn identity(&self) -> SpanIdentity {
        let span = self.cx.span();
        let span_context = span.span_context();
        SpanIdentity::new(
            span_context.trace_id().to_string(),
            span_context.span_id().to_string(),
        )
    }

    fn end(&mut self) {
        if !self.ended {
            self.cx.span().end();
            self.ended = true;
        }
    }
}
