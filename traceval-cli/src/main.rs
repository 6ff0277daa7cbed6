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


//! Traceval CLI
//!
//! Command-line interface for running traced evaluations over JSONL datasets.

mod replay;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::warn;
use traceval_evals::{format_eval_summary, EvalRunner};
use traceval_observability::{
    init_telemetry, init_tracer, shutdown_tracer, ExporterKind, ObservabilityConfig,
    OtelEvalTracer, SpanScoreEmitter,
};

use replay::{load_eval_config, run_replay, RunArgs};

#[derive(Parser)]
#[command(name = "traceval")]
#[command(about = "Traceval - traced dataset evaluation", long_about = None)]
struct Cli {
    /// Verbose mode
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Span exporter: none, stdout or otlp (overrides TRACEVAL_EXPORTER)
    #[arg(long, global = true)]
    exporter: Option<ExporterKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score recorded outputs in a JSONL dataset
    Run(RunArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut observability = ObservabilityConfig::from_env();
    if let Some(exporter) = cli.exporter {
        observability.exporter = exporter;
    }
    if cli.verbose {
        observability.log_filter = "debug".to_string();
    }

    let tracer_provider = init_tracer(&observability)?;
    init_telemetry(&observability, Some(&tracer_provider))?;

    let outcome = match cli.command {
        Commands::Run(args) => run(&args),
    };

    for result in tracer_provider.force_flush() {
        if let Err(e) = result {
            warn!(error = %e, "Failed to flush spans");
        }
    }
    shutdown_tracer();
    outcome
}

fn run(args: &RunArgs) -> Result<()> {
    let config = load_eval_config(args.config.as_deref())?;
    let runner = EvalRunner::new(OtelEvalTracer::global())
        .with_score_sink(Arc::new(SpanScoreEmitter::global()))
        .with_config(config);

    let summary = run_replay(&runner, args)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("{}", format_eval_summary(&summary));
    }

    Ok(())
}
