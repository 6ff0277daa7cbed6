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


//! Span naming and attribute conventions for evaluation runs
//!
//! Every span an evaluation emits follows the `"{operation} {target}"` naming
//! pattern and carries a `traceval.span.kind` attribute.

/// Attribute keys set on evaluation spans
pub mod keys {
    pub const SPAN_KIND: &str = "traceval.span.kind";

    // Run span
    pub const EVAL_NAME: &str = "traceval.eval.name";
    pub const EVAL_RUN_ID: &str = "traceval.eval.run_id";
    pub const EVAL_TOTAL: &str = "traceval.eval.total";
    pub const EVAL_ERRORS: &str = "traceval.eval.errors";
    /// Prefix for per-scorer averages: `traceval.eval.average.<scorer>`
    pub const EVAL_AVERAGE_PREFIX: &str = "traceval.eval.average";

    // Item span
    pub const ITEM_INDEX: &str = "traceval.item.index";
    pub const ITEM_INPUT_PREVIEW: &str = "traceval.item.input_preview";

    // Scorer span
    pub const SCORER_NAME: &str = "traceval.scorer.name";
    pub const SCORE_VALUE: &str = "traceval.score.value";
    pub const SCORE_LABEL: &str = "traceval.score.label";
    pub const SCORE_RATIONALE: &str = "traceval.score.rationale";
    pub const SCORE_SOURCE: &str = "traceval.score.source";
    pub const SCORE_TRACE_ID: &str = "traceval.score.trace_id";
    pub const SCORE_SPAN_ID: &str = "traceval.score.span_id";
    /// Prefix for score metadata entries: `traceval.score.metadata.<key>`
    pub const SCORE_METADATA_PREFIX: &str = "traceval.score.metadata";
}

/// Source tag attached to every score the orchestrator emits
pub const EVAL_SOURCE: &str = "eval";

/// Kind of span within an evaluation tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanKind {
    Evaluation,
    Item,
    Task,
    Scorer,
    Score,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Evaluation => "evaluation",
            Self::Item => "eval_item",
            Self::Task => "task",
            Self::Scorer => "scorer",
            Self::Score => "score",
        }
    }

    /// Operation word used as the span name prefix
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Evaluation => "evaluate",
            Self::Item => "eval_item",
            Self::Task => "task",
            Self::Scorer => "scorer",
            Self::Score => "score",
        }
    }
}

/// Build a span name following the `"{operation} {target}"` pattern
pub fn span_name(kind: SpanKind, target: &str) -> String {
    format!("{} {}", kind.operation(), target)
}

/// Attribute key for a scorer's average on the run span
pub fn average_key(scorer: &str) -> String {
    format!("{}.{}", keys::EVAL_AVERAGE_PREFIX, scorer)
}

/// Cut `text` to at most `max_chars` characters, on a char boundary
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
