use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use puzzlegrader::config::{HarnessConfig, Mode};
use puzzlegrader::llm::BackendKind;
use puzzlegrader::{metrics, stats, tracing as telemetry, BatchRunner};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve and grade every puzzle in a directory
    Run(RunArgs),
    /// Summarize result CSVs
    #[command(subcommand)]
    Stats(StatsCommand),
}

#[derive(Args)]
struct RunArgs {
    /// YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory of puzzle folders
    #[arg(long)]
    puzzles: Option<PathBuf>,

    /// Result CSV path
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Solver executable used for verification
    #[arg(long)]
    solver_binary: Option<PathBuf>,

    #[arg(long, value_enum)]
    solver_backend: Option<BackendKind>,

    #[arg(long)]
    solver_model: Option<String>,

    #[arg(long)]
    grader_model: Option<String>,

    /// Generate guiding questions before solving
    #[arg(long)]
    decompose: bool,

    #[arg(long)]
    max_tries: Option<u32>,

    #[arg(long)]
    max_conversation_length: Option<u32>,

    /// Save a JSON transcript per puzzle here
    #[arg(long)]
    transcripts: Option<PathBuf>,

    /// Write Prometheus metrics here when the run ends
    #[arg(long)]
    metrics_out: Option<PathBuf>,

    /// OTLP collector endpoint
    #[arg(long, env = "OTEL_EXPORTER_OTLP_ENDPOINT")]
    otlp_endpoint: Option<String>,
}

#[derive(Subcommand)]
enum StatsCommand {
    /// Average grade of a result CSV
    Average { csv: PathBuf },
    /// Compare model grades against human reviews
    Compare {
        /// REVIEW_CSV:RESULT_CSV, repeatable
        #[arg(long = "pair", required = true)]
        pairs: Vec<String>,

        /// Result CSV column holding the model grade
        #[arg(long, default_value_t = 0)]
        model_grade_column: usize,
    },
}

impl RunArgs {
    fn into_config(self) -> Result<HarnessConfig> {
        let mut config = match &self.config {
            Some(path) => HarnessConfig::from_yaml_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => HarnessConfig::default(),
        };

        if let Some(dir) = self.puzzles {
            config.puzzles_dir = dir;
        }
        if let Some(out) = self.out {
            config.output_csv = Some(out);
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(binary) = self.solver_binary {
            config.solver_binary = binary;
        }
        if let Some(backend) = self.solver_backend {
            config.solver.backend = backend;
        }
        if let Some(model) = self.solver_model {
            config.solver.model = model;
        }
        if let Some(model) = self.grader_model {
            config.grader.model = model;
        }
        if self.decompose {
            config.use_decomposer = true;
        }
        if let Some(n) = self.max_tries {
            config.repair.max_tries = n;
        }
        if let Some(n) = self.max_conversation_length {
            config.repair.max_conversation_length = n;
        }
        if let Some(dir) = self.transcripts {
            config.transcripts_dir = Some(dir);
        }
        if let Some(path) = self.metrics_out {
            config.metrics_out = Some(path);
        }

        config.validate()?;
        Ok(config)
    }
}

async fn run(args: RunArgs) -> Result<()> {
    let otlp_endpoint = args.otlp_endpoint.clone();
    telemetry::init_tracing("puzzlegrader", otlp_endpoint.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))?;

    let config = args.into_config()?;
    let metrics_out = config.metrics_out.clone();
    let verifier = config.verifier();

    info!(
        solver = %config.solver.model,
        grader = %config.grader.model,
        puzzles = %config.puzzles_dir.display(),
        "Configuration loaded"
    );

    let runner = BatchRunner::from_config(config, verifier)?;
    let summary = runner.run().await.context("batch run failed")?;

    println!("Results written to {}", summary.output.display());
    println!(
        "Puzzles: {}  Graded: {}  Perfect: {}  Verified: {}",
        summary.puzzles, summary.graded, summary.perfect, summary.verified
    );
    if let Some(mean) = summary.mean_grade {
        println!("Average grade: {:.4}", mean);
    }

    if let Some(path) = metrics_out {
        std::fs::write(&path, metrics::render())
            .with_context(|| format!("writing metrics to {}", path.display()))?;
    }

    if otlp_endpoint.is_some() {
        telemetry::shutdown_tracing();
    }
    Ok(())
}

fn parse_pair(pair: &str) -> Result<(PathBuf, PathBuf)> {
    match pair.split_once(':') {
        Some((review, result)) if !review.is_empty() && !result.is_empty() => {
            Ok((PathBuf::from(review), PathBuf::from(result)))
        }
        _ => bail!("invalid pair '{}', expected REVIEW_CSV:RESULT_CSV", pair),
    }
}

fn run_stats(command: StatsCommand) -> Result<()> {
    match command {
        StatsCommand::Average { csv } => {
            let report = stats::average(&csv)?;
            println!("{}", report);
        }
        StatsCommand::Compare {
            pairs,
            model_grade_column,
        } => {
            let pairs = pairs
                .iter()
                .map(|p| parse_pair(p))
                .collect::<Result<Vec<_>>>()?;
            let report = stats::compare(&pairs, model_grade_column)?;
            println!("{}", report);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => run(args).await,
        Command::Stats(command) => run_stats(command),
    }
}
