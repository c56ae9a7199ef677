//! Batch runner
//!
//! Runs every puzzle under the configured directory through the solver and
//! the grader, one at a time, and writes one CSV row per puzzle.
//!
//! ```text
//! load_puzzles() ──► for each puzzle (span with trace_id)
//!                    │  [Decomposer] → hints
//!                    │  RepairLoop | DirectSolver
//!                    │  GradingAgent
//!                    ├─► ResultWriter row (flushed)
//!                    ├─► UsageLedger::persist
//!                    └─► TranscriptStore::save (optional)
//! ```

use std::fs::File;
use std::path::{Path, PathBuf};

use tracing::{info, info_span, warn, Instrument};

use crate::agent::prompts::{
    direct_seed, smt_seed, DECOMPOSER_ROLE, DIRECT_GRADER_ROLE, DIRECT_SOLVER_ROLE, GRADER_ROLE,
    SOLVER_ROLE,
};
use crate::agent::{
    with_hints, Decomposer, DirectSolver, GradingAgent, PuzzleTranscript, RepairLoop, SolverAgent,
    TranscriptStore,
};
use crate::config::{ConfigError, HarnessConfig, Mode};
use crate::extract::Grade;
use crate::llm::{Backend, GenerationClient, LlmError, UsageLedger};
use crate::metrics::GRADES;
use crate::puzzle::{load_puzzles, PuzzleError, PuzzleRecord};
use crate::verifier::Verifier;

/// Column names of the result CSV
pub const RESULT_HEADER: [&str; 7] = [
    "Grade",
    "Puzzle",
    "SMT-LIB Code",
    "Attempted Solution",
    "Full LLM Convo",
    "Grading Process",
    "Solution",
];

/// Artifact column value for runs without a solver
pub const NO_ARTIFACT: &str = "N/A";

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Puzzle(#[from] PuzzleError),
    #[error("Failed to write results: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which agent a client is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Solver,
    Grader,
    Decomposer,
}

/// Builds fresh generation clients for each puzzle
pub trait ClientFactory {
    type Client: GenerationClient;

    fn build(&self, purpose: Purpose, temperature: f32) -> Result<Self::Client, LlmError>;
}

impl ClientFactory for HarnessConfig {
    type Client = Backend;

    fn build(&self, purpose: Purpose, temperature: f32) -> Result<Backend, LlmError> {
        let model = match purpose {
            Purpose::Solver => &self.solver,
            Purpose::Grader => &self.grader,
            Purpose::Decomposer => self.decomposer.as_ref().unwrap_or(&self.solver),
        };
        model.build(temperature)
    }
}

/// One line of the result CSV
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRow {
    pub grade: Option<Grade>,
    pub puzzle: String,
    pub artifact: String,
    pub attempted_solution: String,
    pub transcript: String,
    pub grading_process: String,
    pub solution: String,
}

impl ResultRow {
    fn record(&self) -> [String; 7] {
        [
            self.grade.map(|g| g.to_string()).unwrap_or_default(),
            self.puzzle.clone(),
            self.artifact.clone(),
            self.attempted_solution.clone(),
            self.transcript.clone(),
            self.grading_process.clone(),
            self.solution.clone(),
        ]
    }
}

/// CSV writer that emits the header on creation and flushes every row
pub struct ResultWriter {
    inner: csv::Writer<File>,
}

impl ResultWriter {
    pub fn create(path: &Path) -> Result<Self, csv::Error> {
        let mut inner = csv::Writer::from_path(path)?;
        inner.write_record(RESULT_HEADER)?;
        inner.flush()?;
        Ok(Self { inner })
    }

    pub fn write(&mut self, row: &ResultRow) -> Result<(), csv::Error> {
        self.inner.write_record(row.record())?;
        self.inner.flush()?;
        Ok(())
    }
}

/// Totals for a finished batch
#[derive(Debug, Clone, PartialEq)]
pub struct BatchSummary {
    pub output: PathBuf,
    pub puzzles: usize,
    pub graded: usize,
    pub perfect: usize,
    /// SMT mode only
    pub verified: usize,
    pub mean_grade: Option<f64>,
}

struct PuzzleResult {
    row: ResultRow,
    usage: UsageLedger,
    transcript: PuzzleTranscript,
    verified: bool,
}

pub struct BatchRunner<F, V> {
    config: HarnessConfig,
    factory: F,
    repair: RepairLoop<V>,
}

impl<V: Verifier> BatchRunner<HarnessConfig, V> {
    /// Runner whose clients come from the configured backends
    pub fn from_config(config: HarnessConfig, verifier: V) -> Result<Self, BatchError> {
        let factory = config.clone();
        Self::new(config, factory, verifier)
    }
}

impl<F: ClientFactory, V: Verifier> BatchRunner<F, V> {
    pub fn new(config: HarnessConfig, factory: F, verifier: V) -> Result<Self, BatchError> {
        config.validate()?;
        let repair = RepairLoop::new(config.repair.clone(), verifier)?;
        Ok(Self {
            config,
            factory,
            repair,
        })
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Process every puzzle; only setup failures are returned as errors
    pub async fn run(&self) -> Result<BatchSummary, BatchError> {
        let puzzles = load_puzzles(&self.config.puzzles_dir)?;
        let output = self.config.output_path();
        let mut writer = ResultWriter::create(&output)?;
        let transcripts = match &self.config.transcripts_dir {
            Some(dir) => Some(TranscriptStore::new(dir)?),
            None => None,
        };

        info!(
            puzzles = puzzles.len(),
            mode = ?self.config.mode,
            output = %output.display(),
            "Starting batch"
        );

        let mut summary = BatchSummary {
            output,
            puzzles: 0,
            graded: 0,
            perfect: 0,
            verified: 0,
            mean_grade: None,
        };
        let mut grade_total = 0.0;

        for puzzle in &puzzles {
            let trace_id = uuid::Uuid::now_v7();
            let span = info_span!(
                "puzzle",
                trace_id = %trace_id,
                puzzle = %puzzle.name,
                otel.name = "puzzle"
            );
            let mut result = self.solve_puzzle(puzzle).instrument(span).await;

            writer.write(&result.row)?;

            if let Err(e) = result.usage.persist(&self.config.usage_ledger) {
                warn!(error = %e, path = %self.config.usage_ledger.display(), "Failed to persist token usage");
            }
            if let Some(store) = &transcripts {
                if let Err(e) = store.save(&result.transcript) {
                    warn!(error = %e, puzzle = %puzzle.name, "Failed to save transcript");
                }
            }

            summary.puzzles += 1;
            if result.verified {
                summary.verified += 1;
            }
            if let Some(grade) = result.row.grade {
                summary.graded += 1;
                grade_total += grade.ratio();
                if grade.is_perfect() {
                    summary.perfect += 1;
                }
            }
        }

        if summary.graded > 0 {
            summary.mean_grade = Some(grade_total / summary.graded as f64);
        }
        info!(
            puzzles = summary.puzzles,
            graded = summary.graded,
            perfect = summary.perfect,
            "Batch complete"
        );
        Ok(summary)
    }

    async fn solve_puzzle(&self, puzzle: &PuzzleRecord) -> PuzzleResult {
        match self.config.mode {
            Mode::Smt => self.solve_smt(puzzle).await,
            Mode::Direct => self.solve_direct(puzzle).await,
        }
    }

    fn initial_temperature(&self) -> f32 {
        self.config.repair.temperatures.first().copied().unwrap_or(0.0)
    }

    async fn solve_smt(&self, puzzle: &PuzzleRecord) -> PuzzleResult {
        let description = puzzle.description();
        let mut usage = UsageLedger::new();
        let mut transcript = PuzzleTranscript::new(&puzzle.name, &self.config.solver.model);

        let prompt = if self.config.use_decomposer {
            let hints = self.hints(&description, &mut usage).await;
            with_hints(&description, &hints)
        } else {
            description.clone()
        };

        let client = match self.factory.build(Purpose::Solver, self.initial_temperature()) {
            Ok(c) => c,
            Err(e) => return self.unsolved(puzzle, transcript, usage, e),
        };
        let mut agent = SolverAgent::new(client, SOLVER_ROLE, smt_seed());
        let outcome = self.repair.run(&mut agent, &prompt).await;
        usage.merge(agent.take_usage());

        println!("[REPAIR] {}: {}", puzzle.name, outcome.state.as_str());

        let (grade, explanation) = self
            .grade(
                GRADER_ROLE,
                &puzzle.answer_key,
                &outcome.transcript,
                Some(outcome.verifier_output.as_str()),
                &mut usage,
            )
            .await;

        transcript.turns = outcome.turns.clone();
        transcript.outer_cycles = outcome.outer_cycles;
        transcript.state = Some(outcome.state);
        transcript.artifact = Some(outcome.artifact.clone());
        transcript.verifier_output = Some(outcome.verifier_output.clone());
        transcript.record_grade(grade, explanation.clone());

        PuzzleResult {
            verified: outcome.succeeded(),
            row: ResultRow {
                grade,
                puzzle: description,
                artifact: outcome.artifact,
                attempted_solution: outcome.verifier_output,
                transcript: outcome.transcript,
                grading_process: explanation,
                solution: puzzle.answer_key.clone(),
            },
            usage,
            transcript,
        }
    }

    async fn solve_direct(&self, puzzle: &PuzzleRecord) -> PuzzleResult {
        let description = puzzle.description();
        let mut usage = UsageLedger::new();
        let mut transcript = PuzzleTranscript::new(&puzzle.name, &self.config.solver.model);

        let client = match self.factory.build(Purpose::Solver, self.initial_temperature()) {
            Ok(c) => c,
            Err(e) => return self.unsolved(puzzle, transcript, usage, e),
        };
        let mut solver = DirectSolver::new(client, DIRECT_SOLVER_ROLE, direct_seed());
        let response = match solver.solve(&description).await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Direct solve failed");
                String::new()
            }
        };
        usage.merge(solver.take_usage());
        let convo = solver.conversation().format();

        let (grade, explanation) = self
            .grade(DIRECT_GRADER_ROLE, &puzzle.answer_key, &convo, None, &mut usage)
            .await;

        transcript.turns = solver.conversation().live_turns().to_vec();
        transcript.outer_cycles = 1;
        transcript.record_grade(grade, explanation.clone());

        PuzzleResult {
            verified: false,
            row: ResultRow {
                grade,
                puzzle: description,
                artifact: NO_ARTIFACT.to_string(),
                attempted_solution: response,
                transcript: convo,
                grading_process: explanation,
                solution: puzzle.answer_key.clone(),
            },
            usage,
            transcript,
        }
    }

    /// Hint lines, or none when the decomposer fails
    async fn hints(&self, description: &str, usage: &mut UsageLedger) -> Vec<String> {
        let client = match self.factory.build(Purpose::Decomposer, 0.0) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Decomposer unavailable, continuing without hints");
                return Vec::new();
            }
        };
        let mut decomposer = Decomposer::new(client, DECOMPOSER_ROLE);
        let hints = match decomposer.decompose(description).await {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "Decomposer failed, continuing without hints");
                Vec::new()
            }
        };
        usage.merge(decomposer.take_usage());
        hints
    }

    async fn grade(
        &self,
        role: &str,
        answer_key: &str,
        transcript: &str,
        verifier_output: Option<&str>,
        usage: &mut UsageLedger,
    ) -> (Option<Grade>, String) {
        let client = match self.factory.build(Purpose::Grader, 0.0) {
            Ok(c) => c,
            Err(e) => {
                GRADES.with_label_values(&["failed"]).inc();
                warn!(error = %e, "Grader unavailable");
                println!("[GRADE] failed: {}", e);
                return (None, e.to_string());
            }
        };
        let mut grader = GradingAgent::new(client, role);
        let result = grader.get_grade(answer_key, transcript, verifier_output).await;
        usage.merge(grader.take_usage());

        match result {
            Ok(report) => {
                match report.grade {
                    Some(grade) => {
                        GRADES.with_label_values(&["graded"]).inc();
                        info!(grade = %grade, "Graded");
                        println!("[GRADE] {}", grade);
                    }
                    None => {
                        GRADES.with_label_values(&["ungraded"]).inc();
                        warn!("No score found in grading response");
                        println!("[GRADE] no score");
                    }
                }
                (report.grade, report.explanation)
            }
            Err(e) => {
                GRADES.with_label_values(&["failed"]).inc();
                warn!(error = %e, "Grading request failed");
                println!("[GRADE] failed: {}", e);
                (None, e.to_string())
            }
        }
    }

    /// Row for a puzzle whose solver client could not be built
    fn unsolved(
        &self,
        puzzle: &PuzzleRecord,
        mut transcript: PuzzleTranscript,
        usage: UsageLedger,
        error: LlmError,
    ) -> PuzzleResult {
        warn!(error = %error, puzzle = %puzzle.name, "Solver unavailable");
        GRADES.with_label_values(&["failed"]).inc();
        transcript.record_grade(None, error.to_string());
        PuzzleResult {
            verified: false,
            row: ResultRow {
                grade: None,
                puzzle: puzzle.description(),
                artifact: String::new(),
                attempted_solution: String::new(),
                transcript: String::new(),
                grading_process: error.to_string(),
                solution: puzzle.answer_key.clone(),
            },
            usage,
            transcript,
        }
    }
}
