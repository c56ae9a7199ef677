//! Agents and the repair loop that drives them
//!
//! # Architecture
//!
//! ```text
//! Puzzle description (+ optional hints from Decomposer)
//!                  ↓
//!           RepairLoop → SolverAgent.propose() → artifact
//!                  ↓
//!           Verifier.run(artifact) → solver output
//!                  ↓
//!           Feed output back → next turn, or new cycle at a higher temperature
//!                  ↓
//!           GradingAgent.get_grade(transcript, output, answer key) → X/Y
//! ```

pub mod controller;
pub mod decomposer;
pub mod grader;
pub mod prompts;
pub mod solver;
pub mod transcripts;

pub use controller::{
    LoopState, RepairConfig, RepairLoop, RepairOutcome, RetryBudget, TurnOutcome,
};
pub use decomposer::{with_hints, Decomposer};
pub use grader::{GradeReport, GradingAgent};
pub use solver::{DirectSolver, Proposal, SolverAgent};
pub use transcripts::{PuzzleTranscript, TranscriptStore, TranscriptSummary};
