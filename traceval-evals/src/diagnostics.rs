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


//! Diagnostics channel for recovered failures
//!
//! The runner reports every failure it recovers from through an injected
//! [`Diagnostics`] handle instead of logging directly, so callers can capture
//! them. [`TracingDiagnostics`] forwards them to `tracing`.

use std::fmt;
use tracing::warn;

/// A failure the runner recovered from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The task failed; the item was recorded with an error and not scored
    TaskFailed {
        eval_name: String,
        item_index: usize,
        error: String,
    },

    /// A scorer failed; its result is omitted for this item
    ScorerFailed {
        eval_name: String,
        item_index: usize,
        scorer: String,
        error: String,
    },

    /// A score could not be emitted; the in-memory result is unaffected
    EmitFailed {
        eval_name: String,
        item_index: usize,
        scorer: String,
        error: String,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskFailed {
                eval_name,
                item_index,
                error,
            } => write!(f, "[{}] task failed on item {}: {}", eval_name, item_index, error),
            Self::ScorerFailed {
                eval_name,
                item_index,
                scorer,
                error,
            } => write!(
                f,
                "[{}] scorer '{}' failed on item {}: {}",
                eval_name, scorer, item_index, error
            ),
            Self::EmitFailed {
                eval_name,
                item_index,
                scorer,
                error,
            } => write!(
                f,
                "[{}] failed to emit score '{}' for item {}: {}",
                eval_name, scorer, item_index, error
            ),
        }
    }
}

/// Receiver for recovered failures
pub trait Diagnostics: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` as warnings with structured fields
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        match &diagnostic {
            Diagnostic::TaskFailed {
                eval_name,
                item_index,
                error,
            } => warn!(eval = %eval_name, item_index, error = %error, "Eval task failed"),
            Diagnostic::ScorerFailed {
                eval_name,
                item_index,
                scorer,
                error,
            } => warn!(
                eval = %eval_name,
                item_index,
                scorer = %scorer,
                error = %error,
                "Scorer failed, result omitted"
            ),
            Diagnostic::EmitFailed {
                eval_name,
                item_index,
                scorer,
                error,
            } => warn!(
                eval = %eval_name,
                item_index,
                scorer = %scorer,
                error = %error,
                "Score emission failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic::ScorerFailed {
            eval_name: "qa".to_string(),
            item_index: 2,
            scorer: "judge".to_string(),
            error: "timeout".to_string(),
        };
        assert_eq!(diagnostic.to_string(), "[qa] scorer 'judge' failed on item 2: timeout");
    }
}
