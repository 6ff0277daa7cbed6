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


//! Human-readable run summaries

use crate::result::EvalSummary;
use std::fmt;

/// Render a summary: one header line, then one line per scorer average
///
/// ```text
/// Eval "qa": 10 items, 1 errors
///   exact_match: 0.700
/// ```
pub fn format_eval_summary(summary: &EvalSummary) -> String {
    summary.to_string()
}

impl fmt::Display for EvalSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Eval \"{}\": {} items, {} errors",
            self.name, self.total, self.errors
        )?;
        for (scorer, average) in &self.averages {
            write!(f, "\n  {}: {:.3}", scorer, average)?;
        }
        Ok(())
    }
}
