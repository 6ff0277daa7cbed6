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


//! Replay evaluation: score outputs already stored in a JSONL dataset

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use serde_json::Value;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::vec;
use tracing::info;
use traceval_evals::scorers::{Contains, ExactMatch, JsonFieldMatch};
use traceval_evals::{EvalConfig, EvalDatum, EvalRunner, EvalSummary, EvalTracer, Scorer};

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// JSONL dataset, one object per line with `input`, optional `expected`
    /// and the recorded output
    pub dataset: PathBuf,

    /// Evaluation run name
    #[arg(long)]
    pub name: String,

    /// Row field holding the recorded task output
    #[arg(long, default_value = "output")]
    pub output_field: String,

    /// Scorer to apply (repeatable): exact_match, contains, json_field:<field>
    #[arg(long = "scorer", default_value = "exact_match")]
    pub scorers: Vec<ScorerSpec>,

    /// Do not emit scores as spans
    #[arg(long)]
    pub no_emit: bool,

    /// TOML file with evaluation settings
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// A built-in scorer selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScorerSpec {
    ExactMatch,
    Contains,
    JsonField(String),
}

impl FromStr for ScorerSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once(':') {
            Some(("json_field", field)) if !field.is_empty() => {
                Ok(Self::JsonField(field.to_string()))
            }
            Some(("json_field", _)) => bail!("json_field needs a field name, e.g. json_field:answer"),
            _ => match s {
                "exact_match" => Ok(Self::ExactMatch),
                "contains" => Ok(Self::Contains),
                other => bail!(
                    "unknown scorer '{}' (expected exact_match, contains or json_field:<field>)",
                    other
                ),
            },
        }
    }
}

impl ScorerSpec {
    pub fn build(&self) -> Arc<dyn Scorer> {
        match self {
            Self::ExactMatch => Arc::new(ExactMatch::new()),
            Self::Contains => Arc::new(Contains::new()),
            Self::JsonField(field) => Arc::new(JsonFieldMatch::new(field.clone())),
        }
    }
}

/// Parse JSONL rows, skipping blank lines
pub fn parse_dataset(text: &str) -> Result<Vec<EvalDatum>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str::<EvalDatum>(line)
                .with_context(|| format!("Invalid dataset row on line {}", idx + 1))
        })
        .collect()
}

pub fn load_dataset(path: &Path) -> Result<Vec<EvalDatum>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read dataset {}", path.display()))?;
    parse_dataset(&text)
}

/// Evaluation settings from an optional TOML file, then the environment
pub fn load_eval_config(path: Option<&Path>) -> Result<EvalConfig> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config = EvalConfig::from_toml_str(&text)
                .with_context(|| format!("Invalid config {}", path.display()))?;
            Ok(config.with_env_overrides())
        }
        None => Ok(EvalConfig::from_env()),
    }
}

/// Task that hands back the recorded output of each row
///
/// The runner calls the task once per item in dataset order, so outputs are
/// consumed in step with the rows they came from.
pub struct ReplayTask {
    field: String,
    outputs: RefCell<vec::IntoIter<Option<Value>>>,
}

impl ReplayTask {
    pub fn new(field: &str, data: &[EvalDatum]) -> Self {
        let outputs: Vec<Option<Value>> = data
            .iter()
            .map(|datum| datum.extra.get(field).cloned())
            .collect();
        Self {
            field: field.to_string(),
            outputs: RefCell::new(outputs.into_iter()),
        }
    }

    pub fn next_output(&self, _input: &Value) -> Result<Value> {
        self.outputs
            .borrow_mut()
            .next()
            .flatten()
            .ok_or_else(|| anyhow!("row has no '{}' field", self.field))
    }
}

/// Run the replay evaluation described by `args` on `runner`
///
/// Rationales in the returned summary are cut to the runner's
/// `max_rationale_chars`, like emitted records.
pub fn run_replay<T: EvalTracer>(runner: &EvalRunner<T>, args: &RunArgs) -> Result<EvalSummary> {
    let data = load_dataset(&args.dataset)?;
    let replay = ReplayTask::new(&args.output_field, &data);
    let scorers: Vec<Arc<dyn Scorer>> = args.scorers.iter().map(ScorerSpec::build).collect();

    info!(
        dataset = %args.dataset.display(),
        rows = data.len(),
        scorers = scorers.len(),
        "Starting replay evaluation"
    );

    let summary = runner.evaluate(
        &args.name,
        data,
        |input: &Value| replay.next_output(input),
        &scorers,
        !args.no_emit,
    )?;

    Ok(summary.with_bounded_rationales(runner.config().max_rationale_chars))
}
