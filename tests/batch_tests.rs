//! End-to-end batch tests with scripted agents and verifier

use std::path::Path;

use async_trait::async_trait;

use puzzlegrader::agent::prompts::{DECOMPOSER_ROLE, DIRECT_GRADER_ROLE, GRADER_ROLE};
use puzzlegrader::agent::TranscriptStore;
use puzzlegrader::batch::{BatchRunner, ClientFactory, Purpose, NO_ARTIFACT, RESULT_HEADER};
use puzzlegrader::config::{HarnessConfig, Mode};
use puzzlegrader::conversation::Turn;
use puzzlegrader::llm::{Completion, GenerationClient, LlmError, TokenUsage};
use puzzlegrader::verifier::Verifier;

const PROGRAM: &str = "(set-logic QF_LIA)\n(declare-const ann Int)\n(check-sat)\n(get-model)";

/// Answers according to the role instruction it is given
#[derive(Clone)]
struct RoleClient {
    model: String,
    temperature: f32,
    fail_grading: bool,
}

#[async_trait]
impl GenerationClient for RoleClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn temperature(&self) -> f32 {
        self.temperature
    }

    fn set_temperature(&mut self, temperature: f32) {
        self.temperature = temperature;
    }

    async fn respond(&self, role: &str, history: &[Turn]) -> Result<Completion, LlmError> {
        let text = if role == GRADER_ROLE || role == DIRECT_GRADER_ROLE {
            if self.fail_grading {
                return Err(LlmError::Status {
                    status: 500,
                    body: "grader down".into(),
                });
            }
            "Every clue holds. Grade: 2/3".to_string()
        } else if role == DECOMPOSER_ROLE {
            "Who is oldest?\nWho is tallest?".to_string()
        } else {
            let last = history.last().map(|t| t.text.as_str()).unwrap_or_default();
            format!("For input of {} chars:\n{}", last.len(), PROGRAM)
        };
        Ok(Completion {
            text,
            usage: TokenUsage {
                prompt_tokens: 100,
                completion_tokens: 20,
            },
        })
    }
}

#[derive(Default)]
struct RoleFactory {
    fail_grading: bool,
    fail_decomposer: bool,
    fail_solver: bool,
}

impl ClientFactory for RoleFactory {
    type Client = RoleClient;

    fn build(&self, purpose: Purpose, temperature: f32) -> Result<RoleClient, LlmError> {
        match purpose {
            Purpose::Decomposer if self.fail_decomposer => {
                return Err(LlmError::Status {
                    status: 503,
                    body: "decomposer down".into(),
                })
            }
            Purpose::Solver if self.fail_solver => {
                return Err(LlmError::MissingApiKey("PUZZLEGRADER_SOLVER_KEY".into()))
            }
            _ => {}
        }
        let model = match purpose {
            Purpose::Solver => "solver-model",
            Purpose::Grader => "grader-model",
            Purpose::Decomposer => "decomposer-model",
        };
        Ok(RoleClient {
            model: model.to_string(),
            temperature,
            fail_grading: self.fail_grading,
        })
    }
}

struct SatVerifier;

#[async_trait]
impl Verifier for SatVerifier {
    async fn run(&self, _input: &str) -> String {
        "sat\n(model (define-fun ann () Int 12))".to_string()
    }
}

fn write_puzzle(root: &Path, name: &str, complete: bool) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("answers.txt"), format!("{} answers", name)).unwrap();
    std::fs::write(dir.join("entities.txt"), "Names: Ann, Bob").unwrap();
    if complete {
        std::fs::write(dir.join("clues.txt"), "1. Ann is older than Bob").unwrap();
    }
}

fn config_in(dir: &Path, mode: Mode) -> HarnessConfig {
    let puzzles = dir.join("puzzles");
    write_puzzle(&puzzles, "puzzle_02", true);
    write_puzzle(&puzzles, "puzzle_01", true);
    write_puzzle(&puzzles, "puzzle_03", false);

    HarnessConfig {
        puzzles_dir: puzzles,
        output_csv: Some(dir.join("results.csv")),
        usage_ledger: dir.join("tokens_count.csv"),
        transcripts_dir: Some(dir.join("transcripts")),
        mode,
        ..HarnessConfig::default()
    }
}

fn read_csv(path: &Path) -> Vec<csv::StringRecord> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .unwrap()
        .records()
        .map(|r| r.unwrap())
        .collect()
}

#[tokio::test]
async fn test_batch_writes_one_row_per_complete_puzzle() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), Mode::Smt);
    let runner = BatchRunner::new(config, RoleFactory::default(), SatVerifier).unwrap();

    let summary = runner.run().await.unwrap();

    assert_eq!(summary.puzzles, 2);
    assert_eq!(summary.graded, 2);
    assert_eq!(summary.verified, 2);
    assert_eq!(summary.perfect, 0);
    assert!((summary.mean_grade.unwrap() - 2.0 / 3.0).abs() < 1e-9);

    let rows = read_csv(&dir.path().join("results.csv"));
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].iter().collect::<Vec<_>>(), RESULT_HEADER.to_vec());

    let first = &rows[1];
    assert_eq!(&first[0], "2/3");
    assert_eq!(&first[1], "Names: Ann, Bob\n1. Ann is older than Bob");
    assert_eq!(&first[2], PROGRAM);
    assert!(first[3].starts_with("sat"));
    assert!(first[4].starts_with("User: Names: Ann, Bob"));
    assert!(first[5].contains("Grade: 2/3"));
    assert_eq!(&first[6], "puzzle_01 answers");
    assert_eq!(&rows[2][6], "puzzle_02 answers");

    let usage = read_csv(&dir.path().join("tokens_count.csv"));
    let models: Vec<&str> = usage.iter().skip(1).map(|r| &r[0]).collect();
    assert!(models.contains(&"solver-model"));
    assert!(models.contains(&"grader-model"));

    let store = TranscriptStore::new(dir.path().join("transcripts")).unwrap();
    assert_eq!(store.list().unwrap().len(), 2);
}

#[tokio::test]
async fn test_decomposer_hints_reach_solver() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), Mode::Smt);
    config.use_decomposer = true;
    let runner = BatchRunner::new(config, RoleFactory::default(), SatVerifier).unwrap();

    runner.run().await.unwrap();

    let rows = read_csv(&dir.path().join("results.csv"));
    // The puzzle column keeps the bare description, the transcript shows the hints
    assert!(!rows[1][1].contains("Guiding Questions"));
    assert!(rows[1][4].contains("\"Guiding Questions:\"\nWho is oldest?\nWho is tallest?"));

    let usage = read_csv(&dir.path().join("tokens_count.csv"));
    assert!(usage.iter().any(|r| &r[0] == "decomposer-model"));
}

#[tokio::test]
async fn test_direct_mode_marks_artifact_not_applicable() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), Mode::Direct);
    let runner = BatchRunner::new(config, RoleFactory::default(), SatVerifier).unwrap();

    let summary = runner.run().await.unwrap();

    assert_eq!(summary.verified, 0);
    let rows = read_csv(&dir.path().join("results.csv"));
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[1][2], NO_ARTIFACT);
    assert!(rows[1][3].contains("(set-logic"));
    assert_eq!(&rows[1][0], "2/3");
}

#[tokio::test]
async fn test_grading_failure_still_writes_row() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), Mode::Smt);
    let factory = RoleFactory {
        fail_grading: true,
        ..RoleFactory::default()
    };
    let runner = BatchRunner::new(config, factory, SatVerifier).unwrap();

    let summary = runner.run().await.unwrap();

    assert_eq!(summary.puzzles, 2);
    assert_eq!(summary.graded, 0);
    assert!(summary.mean_grade.is_none());
    let rows = read_csv(&dir.path().join("results.csv"));
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[1][0], "");
    assert!(rows[1][5].contains("500"));
    assert_eq!(&rows[1][2], PROGRAM);
}

#[tokio::test]
async fn test_decomposer_failure_proceeds_without_hints() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path(), Mode::Smt);
    config.use_decomposer = true;
    let factory = RoleFactory {
        fail_decomposer: true,
        ..RoleFactory::default()
    };
    let runner = BatchRunner::new(config, factory, SatVerifier).unwrap();

    let summary = runner.run().await.unwrap();

    assert_eq!(summary.puzzles, 2);
    assert_eq!(summary.graded, 2);
    let rows = read_csv(&dir.path().join("results.csv"));
    assert_eq!(rows.len(), 3);
    for row in &rows[1..] {
        assert!(!row[4].contains("Guiding Questions:"));
        assert!(row[4].starts_with("User: Names: Ann, Bob\n1. Ann is older than Bob\n"));
        assert_eq!(&row[2], PROGRAM);
    }
}

#[tokio::test]
async fn test_solver_client_failure_still_writes_rows() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), Mode::Smt);
    let factory = RoleFactory {
        fail_solver: true,
        ..RoleFactory::default()
    };
    let runner = BatchRunner::new(config, factory, SatVerifier).unwrap();

    let summary = runner.run().await.unwrap();

    assert_eq!(summary.puzzles, 2);
    assert_eq!(summary.graded, 0);
    assert_eq!(summary.verified, 0);
    let rows = read_csv(&dir.path().join("results.csv"));
    assert_eq!(rows.len(), 3);
    for row in &rows[1..] {
        assert_eq!(&row[0], "");
        assert_eq!(&row[5], "Missing API key: set PUZZLEGRADER_SOLVER_KEY");
    }
    assert_eq!(&rows[1][6], "puzzle_01 answers");
}

#[tokio::test]
async fn test_missing_puzzle_dir_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = HarnessConfig {
        puzzles_dir: dir.path().join("absent"),
        output_csv: Some(dir.path().join("results.csv")),
        ..HarnessConfig::default()
    };
    let runner = BatchRunner::new(config, RoleFactory::default(), SatVerifier).unwrap();
    assert!(runner.run().await.is_err());
}
