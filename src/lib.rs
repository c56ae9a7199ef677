//! puzzlegrader - LLM logic-puzzle solving with solver feedback and automated grading
//!
//! A generating agent encodes a logic puzzle as SMT-LIB, an external solver
//! checks it, and solver errors are fed back until the encoding runs clean or
//! the retry budget is spent. A second agent grades the result against an
//! answer key.
//!
//! # Modules
//!
//! - `conversation` - Tagged turn log with a few-shot seed
//! - `extract` - Artifact and score extraction from model text
//! - `llm` - Generation backends and token usage accounting
//! - `verifier` - Solver process invocation
//! - `agent` - Solver, grader and decomposer agents plus the repair loop
//! - `puzzle` - Puzzle directories on disk
//! - `batch` - Batch runner and result CSV
//! - `stats` - Grade statistics and human/model comparison
//! - `config` - Harness configuration
//! - `metrics` - Prometheus metrics
//! - `tracing` - Logging and OpenTelemetry export
//!
//! # Quick Start
//!
//! ```ignore
//! use puzzlegrader::{BatchRunner, HarnessConfig};
//!
//! let config = HarnessConfig::default();
//! let verifier = config.verifier();
//! let summary = BatchRunner::from_config(config, verifier)?.run().await?;
//! ```

pub mod agent;
pub mod batch;
pub mod config;
pub mod conversation;
pub mod extract;
pub mod llm;
pub mod metrics;
pub mod puzzle;
pub mod stats;
pub mod tracing;
pub mod verifier;

pub use agent::{GradingAgent, RepairConfig, RepairLoop, RepairOutcome, SolverAgent};
pub use batch::{BatchRunner, BatchSummary};
pub use config::{HarnessConfig, Mode, ModelConfig};
pub use conversation::{Conversation, Role, Turn};
pub use extract::Grade;
pub use verifier::{SolverProcess, Verifier};
