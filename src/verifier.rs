//! External solver invocation
//!
//! The artifact is written to a transient file, the solver binary is run on
//! it, and whatever the solver printed comes back as text. Launch failures are
//! reported in-band as `"An error occurred: ..."` so the repair loop can feed
//! them to the model like any other solver complaint.
//!
//! ```text
//! artifact ──► NamedTempFile ──► z3 <file> ──► stdout + stderr ──► String
//!                   │                                 │
//!                   └──── removed on drop ◄───────────┘
//! ```

use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::metrics::{VERIFIER_DURATION, VERIFIER_RUNS};

/// Default solver binary, resolved through `PATH`
pub const DEFAULT_SOLVER_BINARY: &str = "z3";

/// Prefix of in-band launch failures
pub const VERIFIER_ERROR_PREFIX: &str = "An error occurred:";

/// How a verifier output is judged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Output free of the word "error"
    Clean,
    /// Output mentions "error" (syntax errors, launch failures, ...)
    Error,
}

impl Verdict {
    /// Classify solver output.
    ///
    /// Any occurrence of the literal substring `error` marks a failure, even
    /// inside model values. Existing graded datasets were produced with this
    /// rule.
    pub fn classify(output: &str) -> Self {
        if output.contains("error") {
            Verdict::Error
        } else {
            Verdict::Clean
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Verdict::Clean)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Clean => "clean",
            Verdict::Error => "error",
        }
    }
}

/// Something that evaluates an artifact and reports in text
#[async_trait]
pub trait Verifier: Send + Sync {
    /// Run the artifact; never fails outward
    async fn run(&self, input: &str) -> String;
}

/// Runs a solver binary as a child process
#[derive(Debug, Clone)]
pub struct SolverProcess {
    binary: PathBuf,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for SolverProcess {
    fn default() -> Self {
        Self::new(DEFAULT_SOLVER_BINARY)
    }
}

impl SolverProcess {
    /// Create a verifier for `binary`; the input file path is the last argument
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            args: Vec::new(),
            timeout: None,
        }
    }

    /// Extra arguments placed before the input file path
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Kill the solver after `timeout`; by default it runs to completion
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn binary(&self) -> &PathBuf {
        &self.binary
    }

    async fn execute(&self, input: &str) -> Result<String, std::io::Error> {
        // Dropped at the end of this function on every path, deleting the file
        let mut file = tempfile::Builder::new()
            .prefix("puzzlegrader-")
            .suffix(".smt2")
            .tempfile()?;
        file.write_all(input.as_bytes())?;
        file.flush()?;

        let mut cmd = Command::new(&self.binary);
        cmd.args(&self.args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output())
                .await
                .map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("solver timed out after {:?}", limit),
                    )
                })??,
            None => cmd.output().await?,
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(merge_output(&stdout, &stderr))
    }
}

#[async_trait]
impl Verifier for SolverProcess {
    async fn run(&self, input: &str) -> String {
        let start = Instant::now();
        let output = match self.execute(input).await {
            Ok(text) => text,
            Err(e) => {
                warn!(binary = %self.binary.display(), error = %e, "Solver invocation failed");
                format!("{} {}", VERIFIER_ERROR_PREFIX, e)
            }
        };
        VERIFIER_DURATION.observe(start.elapsed().as_secs_f64());

        let verdict = Verdict::classify(&output);
        VERIFIER_RUNS.with_label_values(&[verdict.as_str()]).inc();
        debug!(verdict = verdict.as_str(), output_len = output.len(), "Solver finished");
        output
    }
}

/// Join the two streams, stdout first
fn merge_output(stdout: &str, stderr: &str) -> String {
    match (stdout.is_empty(), stderr.is_empty()) {
        (_, true) => stdout.to_string(),
        (true, false) => stderr.to_string(),
        (false, false) if stdout.ends_with('\n') => format!("{}{}", stdout, stderr),
        (false, false) => format!("{}\n{}", stdout, stderr),
    }
}
