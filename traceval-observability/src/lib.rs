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


//! # Traceval Observability
//!
//! OpenTelemetry backends for the evaluation runner's seams plus the
//! bootstrap that installs a tracer provider and a logging subscriber.
//!
//! - [`OtelEvalTracer`]: evaluation spans as OpenTelemetry spans
//! - [`SpanScoreEmitter`]: each emitted score becomes a terminal span
//! - [`init_tracer`] / [`init_telemetry`]: provider and subscriber setup
//!   driven by [`ObservabilityConfig`]

use thiserror::Error;

pub mod config;
pub mod score_span;
pub mod telemetry;
pub mod tracer;

pub use config::{ExporterKind, ObservabilityConfig};
pub use score_span::SpanScoreEmitter;
pub use telemetry::init_telemetry;
pub use tracer::{init_tracer, shutdown_tracer, OtelEvalSpan, OtelEvalTracer};

/// Instrumentation scope name for spans created by traceval
pub const INSTRUMENTATION_NAME: &str = "traceval";

/// Errors raised while bootstrapping observability
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Trace pipeline error: {0}")]
    Trace(#[from] opentelemetry::trace::TraceError),

    #[error("Failed to install logging subscriber: {0}")]
    Subscriber(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
