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


//! Evaluation runner
//!
//! Drives a dataset through a task and a list of scorers, strictly one item
//! and one scorer at a time, and mirrors the run as a span tree:
//!
//! ```text
//! evaluate <run>
//! ├── eval_item 0
//! │   ├── task <run>
//! │   ├── scorer <scorer a>
//! │   └── scorer <scorer b>
//! └── eval_item 1
//!     └── task <run>          (failed: no scorer spans)
//! ```
//!
//! Failures are isolated: a failing task marks its item and skips scoring, a
//! failing scorer is omitted for that item, a failing score sink is reported
//! and ignored. Panics inside tasks, scorers and sinks are treated like
//! returned errors.

use crate::adapter::adapt_score;
use crate::config::EvalConfig;
use crate::conventions::{average_key, keys, span_name, truncate_chars, SpanKind};
use crate::dataset::{value_to_text, Dataset, EvalDatum};
use crate::diagnostics::{Diagnostic, Diagnostics, TracingDiagnostics};
use crate::emitter::{NoopScoreSink, ScoreRecord, ScoreSink};
use crate::result::{EvalResult, EvalSummary, Score};
use crate::scorer::{Scorer, ScorerArgs};
use crate::tracer::{EvalTracer, SpanGuard, SpanIdentity};
use crate::EvalError;
use futures::FutureExt;
use indexmap::IndexMap;
use opentelemetry::KeyValue;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Runs evaluations against a tracer, score sink and diagnostics channel
pub struct EvalRunner<T: EvalTracer> {
    tracer: T,
    sink: Arc<dyn ScoreSink>,
    diagnostics: Arc<dyn Diagnostics>,
    config: EvalConfig,
}

struct RunState<T: EvalTracer> {
    name: String,
    span: SpanGuard<T::Span>,
    results: Vec<EvalResult>,
}

impl<T: EvalTracer> EvalRunner<T> {
    /// Runner with a no-op score sink, `tracing` diagnostics and default config
    pub fn new(tracer: T) -> Self {
        Self {
            tracer,
            sink: Arc::new(NoopScoreSink),
            diagnostics: Arc::new(TracingDiagnostics),
            config: EvalConfig::default(),
        }
    }

    pub fn with_score_sink(mut self, sink: Arc<dyn ScoreSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Arc<dyn Diagnostics>) -> Self {
        self.diagnostics = diagnostics;
        self
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tracer(&self) -> &T {
        &self.tracer
    }

    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    /// Evaluate `task` over `data` with `scorers`
    ///
    /// Items are processed in dataset order and scorers in slice order. When
    /// `emit_scores` is set, every recorded score is also routed to the score
    /// sink. The only error is a dataset producer that fails.
    pub fn evaluate<F>(
        &self,
        name: &str,
        data: impl Into<Dataset>,
        task: F,
        scorers: &[Arc<dyn Scorer>],
        emit_scores: bool,
    ) -> Result<EvalSummary, EvalError>
    where
        F: Fn(&Value) -> anyhow::Result<Value>,
    {
        let items = data.into().load().map_err(EvalError::Dataset)?;
        let mut run = self.open_run(name, items.len());

        for (index, datum) in items.into_iter().enumerate() {
            let item_span = self.open_item(&run, index, &datum);
            let task_span = self.open_task(&run, index, &item_span);
            let outcome = call_guarded(|| task(&datum.input));
            self.complete_item(
                &mut run,
                index,
                datum,
                item_span,
                task_span,
                outcome,
                scorers,
                emit_scores,
            );
        }

        Ok(self.finish_run(run))
    }

    /// Same as [`evaluate`](Self::evaluate) for a task that returns a future
    ///
    /// Each task future is awaited inside its task span before the item is
    /// scored; items are still processed one at a time.
    pub async fn evaluate_async<F, Fut>(
        &self,
        name: &str,
        data: impl Into<Dataset>,
        task: F,
        scorers: &[Arc<dyn Scorer>],
        emit_scores: bool,
    ) -> Result<EvalSummary, EvalError>
    where
        F: Fn(Value) -> Fut,
        Fut: Future<Output = anyhow::Result<Value>>,
    {
        let items = data.into().load().map_err(EvalError::Dataset)?;
        let mut run = self.open_run(name, items.len());

        for (index, datum) in items.into_iter().enumerate() {
            let item_span = self.open_item(&run, index, &datum);
            let task_span = self.open_task(&run, index, &item_span);
            let outcome = match call_guarded(|| Ok(task(datum.input.clone()))) {
                Ok(future) => match AssertUnwindSafe(future).catch_unwind().await {
                    Ok(outcome) => outcome,
                    Err(payload) => Err(panic_error(payload.as_ref())),
                },
                Err(error) => Err(error),
            };
            self.complete_item(
                &mut run,
                index,
                datum,
                item_span,
                task_span,
                outcome,
                scorers,
                emit_scores,
            );
        }

        Ok(self.finish_run(run))
    }

    fn open_run(&self, name: &str, total: usize) -> RunState<T> {
        let run_id = Uuid::new_v4();
        info!(eval = %name, %run_id, total, "Starting evaluation");

        let span = self.tracer.start_guarded(
            &span_name(SpanKind::Evaluation, name),
            None,
            vec![
                KeyValue::new(keys::SPAN_KIND, SpanKind::Evaluation.as_str()),
                KeyValue::new(keys::EVAL_NAME, name.to_string()),
                KeyValue::new(keys::EVAL_RUN_ID, run_id.to_string()),
                KeyValue::new(keys::EVAL_TOTAL, total as i64),
            ],
        );

        RunState {
            name: name.to_string(),
            span,
            results: Vec::with_capacity(total),
        }
    }

    fn open_item(&self, run: &RunState<T>, index: usize, datum: &EvalDatum) -> SpanGuard<T::Span> {
        let preview = truncate_chars(&value_to_text(&datum.input), self.config.input_preview_chars);
        self.tracer.start_guarded(
            &span_name(SpanKind::Item, &index.to_string()),
            Some(&run.span),
            vec![
                KeyValue::new(keys::SPAN_KIND, SpanKind::Item.as_str()),
                KeyValue::new(keys::ITEM_INDEX, index as i64),
                KeyValue::new(keys::ITEM_INPUT_PREVIEW, preview),
            ],
        )
    }

    fn open_task(
        &self,
        run: &RunState<T>,
        index: usize,
        item_span: &SpanGuard<T::Span>,
    ) -> SpanGuard<T::Span> {
        self.tracer.start_guarded(
            &span_name(SpanKind::Task, &run.name),
            Some(item_span),
            vec![
                KeyValue::new(keys::SPAN_KIND, SpanKind::Task.as_str()),
                KeyValue::new(keys::ITEM_INDEX, index as i64),
            ],
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn complete_item(
        &self,
        run: &mut RunState<T>,
        index: usize,
        datum: EvalDatum,
        item_span: SpanGuard<T::Span>,
        mut task_span: SpanGuard<T::Span>,
        outcome: anyhow::Result<Value>,
        scorers: &[Arc<dyn Scorer>],
        emit_scores: bool,
    ) {
        let result = match outcome {
            Err(error) => {
                let message = format!("{:#}", error);
                task_span.set_error(&message);
                task_span.record_exception(&error);
                task_span.end();

                self.diagnostics.report(Diagnostic::TaskFailed {
                    eval_name: run.name.clone(),
                    item_index: index,
                    error: message.clone(),
                });

                EvalResult {
                    input: datum.input,
                    expected: datum.expected,
                    output: None,
                    scores: IndexMap::new(),
                    error: Some(message),
                }
            }
            Ok(output) => {
                task_span.end();

                let scores = self.apply_scorers(&run.name, index, &datum, &output, &item_span, scorers);
                if emit_scores {
                    self.emit_scores(&run.name, index, &item_span.identity(), &scores);
                }
                debug!(eval = %run.name, item_index = index, scored = scores.len(), "Item scored");

                EvalResult {
                    input: datum.input,
                    expected: datum.expected,
                    output: Some(output),
                    scores,
                    error: None,
                }
            }
        };

        run.results.push(result);
        item_span.end();
    }

    fn apply_scorers(
        &self,
        eval_name: &str,
        index: usize,
        datum: &EvalDatum,
        output: &Value,
        item_span: &SpanGuard<T::Span>,
        scorers: &[Arc<dyn Scorer>],
    ) -> IndexMap<String, Score> {
        let args = ScorerArgs::for_datum(datum, output);
        let mut scores = IndexMap::new();

        for scorer in scorers {
            let mut span = self.tracer.start_guarded(
                &span_name(SpanKind::Scorer, scorer.name()),
                Some(item_span),
                vec![
                    KeyValue::new(keys::SPAN_KIND, SpanKind::Scorer.as_str()),
                    KeyValue::new(keys::SCORER_NAME, scorer.name().to_string()),
                    KeyValue::new(keys::ITEM_INDEX, index as i64),
                ],
            );

            match call_guarded(|| scorer.score(&args)) {
                Ok(raw) => {
                    let score = adapt_score(scorer.name(), &raw);
                    if let Some(value) = score.value {
                        span.set_attribute(KeyValue::new(keys::SCORE_VALUE, value));
                    }
                    if let Some(label) = &score.label {
                        span.set_attribute(KeyValue::new(keys::SCORE_LABEL, label.clone()));
                    }
                    scores.insert(scorer.name().to_string(), score);
                }
                Err(error) => {
                    let message = format!("{:#}", error);
                    span.set_error(&message);
                    span.record_exception(&error);
                    self.diagnostics.report(Diagnostic::ScorerFailed {
                        eval_name: eval_name.to_string(),
                        item_index: index,
                        scorer: scorer.name().to_string(),
                        error: message,
                    });
                }
            }

            span.end();
        }

        scores
    }

    fn emit_scores(
        &self,
        eval_name: &str,
        index: usize,
        identity: &SpanIdentity,
        scores: &IndexMap<String, Score>,
    ) {
        for score in scores.values() {
            let record = ScoreRecord::for_eval_item(
                score,
                identity,
                eval_name,
                index,
                self.config.max_rationale_chars,
            );
            if let Err(error) = call_guarded(|| self.sink.emit(&record).map_err(anyhow::Error::from)) {
                self.diagnostics.report(Diagnostic::EmitFailed {
                    eval_name: eval_name.to_string(),
                    item_index: index,
                    scorer: score.name.clone(),
                    error: format!("{:#}", error),
                });
            }
        }
    }

    fn finish_run(&self, run: RunState<T>) -> EvalSummary {
        let RunState {
            name,
            mut span,
            results,
        } = run;
        let summary = EvalSummary::from_results(name, results);

        for (scorer, average) in &summary.averages {
            span.set_attribute(KeyValue::new(average_key(scorer), *average));
        }
        span.set_attribute(KeyValue::new(keys::EVAL_ERRORS, summary.errors as i64));
        span.end();

        info!(
            eval = %summary.name,
            total = summary.total,
            errors = summary.errors,
            "Evaluation finished"
        );
        summary
    }
}

/// Run `f`, turning a panic into an error
fn call_guarded<R>(f: impl FnOnce() -> anyhow::Result<R>) -> anyhow::Result<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => Err(panic_error(payload.as_ref())),
    }
}

fn panic_error(payload: &(dyn Any + Send)) -> anyhow::Error {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string());
    anyhow::anyhow!("panicked: {}", message)
}
