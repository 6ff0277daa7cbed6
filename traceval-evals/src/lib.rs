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


//! # Traceval Evaluation Framework
//!
//! Runs a labeled dataset through a task function, scores every output with
//! pluggable scorers and aggregates the results, while emitting each step as a
//! span tree through an [`EvalTracer`].
//!
//! ## Features
//!
//! - **Loose scorer contract**: any [`Scorer`] returning arbitrary JSON
//! - **Shape adapter**: heterogeneous scorer results normalized into [`Score`]
//! - **Failure isolation**: failing tasks, scorers and score sinks never abort a run
//! - **Span tree**: run → item → task / scorer spans, closed on every exit path
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use traceval_evals::scorers::ExactMatch;
//! use traceval_evals::{EvalDatum, EvalRunner, InMemoryTracer, Scorer};
//!
//! let runner = EvalRunner::new(InMemoryTracer::new());
//! let data = vec![EvalDatum::with_expected("2+2?", "4")];
//! let scorers: Vec<Arc<dyn Scorer>> = vec![Arc::new(ExactMatch::new())];
//!
//! let summary = runner.evaluate("arithmetic", data, |_| Ok("4".into()), &scorers, true)?;
//! println!("{}", summary);
//! ```

use thiserror::Error;

pub mod adapter;
pub mod config;
pub mod conventions;
pub mod dataset;
pub mod diagnostics;
pub mod emitter;
pub mod memory;
pub mod result;
pub mod runner;
pub mod scorer;
pub mod scorers;
pub mod summary;
pub mod tracer;

pub use adapter::adapt_score;
pub use config::EvalConfig;
pub use dataset::{Dataset, EvalDatum};
pub use diagnostics::{Diagnostic, Diagnostics, TracingDiagnostics};
pub use emitter::{EmitError, NoopScoreSink, ScoreRecord, ScoreSink};
pub use memory::{InMemoryScoreSink, InMemoryTracer, RecordedSpan, RecordingDiagnostics};
pub use result::{EvalResult, EvalSummary, Score};
pub use runner::EvalRunner;
pub use scorer::{FnScorer, Scorer, ScorerArgs};
pub use summary::format_eval_summary;
pub use tracer::{EvalSpan, EvalTracer, NoopTracer, SpanGuard, SpanIdentity, SpanStatus};

/// Errors that escape an evaluation run
///
/// Task, scorer and emission failures are recovered inside the run, so the
/// only outward failure is a dataset that could not be produced.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("Failed to load dataset: {0:#}")]
    Dataset(anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_error_display_keeps_cause_chain() {
        let err = EvalError::Dataset(
            anyhow::anyhow!("file missing").context("reading cases.jsonl"),
        );
        assert_eq!(
            err.to_string(),
            "Failed to load dataset: reading cases.jsonl: file missing"
        );
    }
}
