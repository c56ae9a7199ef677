//! Repair Loop Controller - bounded generate / verify / repair orchestration
//!
//! Two tiers of backoff:
//!
//! ```text
//! outer cycle (up to max_tries)
//! │  reset conversation to seed, prompt = puzzle description
//! │
//! │  inner turn (up to max_conversation_length)
//! │  │  propose(prompt) ──► artifact? ──► latest_artifact
//! │  │  verify(latest_artifact) ──► output ──► next prompt
//! │  └─ generation failure: keep prompt, next turn
//! │
//! ├─ last output clean   ──► Succeeded
//! └─ otherwise           ──► Retrying, temperature steps up the schedule
//!                            (Exhausted once attempts run out)
//! ```
//!
//! Inner turns repair cheaply inside one context; outer cycles pay for a
//! full reset but sample hotter to escape a repeatedly broken encoding.

use tracing::{debug, debug_span, info, info_span, warn, Instrument};

use crate::config::ConfigError;
use crate::conversation::Turn;
use crate::extract::LOGIC_START_MARKER;
use crate::llm::GenerationClient;
use crate::metrics::{REPAIR_CYCLES, REPAIR_OUTCOMES};
use crate::verifier::{Verdict, Verifier};

use super::solver::SolverAgent;

/// Settings for the repair loop
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RepairConfig {
    /// Outer cycles before giving up
    pub max_tries: u32,
    /// Inner propose/verify turns per outer cycle
    pub max_conversation_length: u32,
    /// Sampling temperatures; entry 0 for the first cycle, then one step per failed cycle
    pub temperatures: Vec<f32>,
    /// End an outer cycle as soon as the verifier output is clean
    pub stop_when_clean: bool,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_tries: 3,
            max_conversation_length: 4,
            temperatures: vec![0.0, 0.001, 0.01],
            stop_when_clean: false,
        }
    }
}

impl RepairConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tries == 0 {
            return Err(ConfigError::Invalid("max_tries must be at least 1".into()));
        }
        if self.max_conversation_length == 0 {
            return Err(ConfigError::Invalid(
                "max_conversation_length must be at least 1".into(),
            ));
        }
        if self.temperatures.is_empty() {
            return Err(ConfigError::Invalid("temperature schedule is empty".into()));
        }
        if self.temperatures.windows(2).any(|w| w[1] < w[0]) {
            return Err(ConfigError::Invalid(
                "temperature schedule must be non-decreasing".into(),
            ));
        }
        Ok(())
    }
}

/// Remaining outer cycles and the temperature schedule
#[derive(Debug, Clone)]
pub struct RetryBudget {
    max_tries: u32,
    attempts_remaining: u32,
    schedule: Vec<f32>,
}

impl RetryBudget {
    pub fn new(max_tries: u32, schedule: Vec<f32>) -> Self {
        Self {
            max_tries,
            attempts_remaining: max_tries,
            schedule,
        }
    }

    pub fn attempts_remaining(&self) -> u32 {
        self.attempts_remaining
    }

    pub fn has_attempts(&self) -> bool {
        self.attempts_remaining > 0
    }

    pub fn initial_temperature(&self) -> Option<f32> {
        self.schedule.first().copied()
    }

    /// Spend one attempt; returns the temperature for the next cycle, if any.
    ///
    /// The schedule index is `max_tries - attempts_remaining`, clamped to the
    /// last entry.
    pub fn record_failure(&mut self) -> Option<f32> {
        self.attempts_remaining = self.attempts_remaining.saturating_sub(1);
        if self.attempts_remaining == 0 || self.schedule.is_empty() {
            return None;
        }
        let step = (self.max_tries - self.attempts_remaining) as usize;
        let index = step.min(self.schedule.len() - 1);
        Some(self.schedule[index])
    }
}

/// Repair loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum LoopState {
    Seeded,
    Proposing,
    Verifying,
    Succeeded,
    Retrying,
    Exhausted,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoopState::Seeded => "seeded",
            LoopState::Proposing => "proposing",
            LoopState::Verifying => "verifying",
            LoopState::Succeeded => "succeeded",
            LoopState::Retrying => "retrying",
            LoopState::Exhausted => "exhausted",
        }
    }
}

/// What a single inner turn produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model answered and the verifier ran
    Verified(Verdict),
    /// Generation failed; worth another turn
    RetryableFailure(String),
    /// Generation cannot succeed for this puzzle (credentials, unknown model)
    FatalFailure(String),
}

/// Final report of a repair run
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    /// `Succeeded` or `Exhausted`
    pub state: LoopState,
    /// Last SMT-LIB program that contained the logic declaration
    pub artifact: String,
    /// Verifier output for `artifact`, from a final re-run
    pub verifier_output: String,
    /// Post-seed conversation of the last cycle, rendered for logs and grading
    pub transcript: String,
    /// Post-seed turns of the last cycle
    pub turns: Vec<Turn>,
    pub outer_cycles: u32,
    pub inner_turns: u32,
    /// Temperature of each outer cycle, in order
    pub temperatures: Vec<f32>,
}

impl RepairOutcome {
    pub fn succeeded(&self) -> bool {
        self.state == LoopState::Succeeded
    }
}

struct CycleReport {
    last_verdict: Option<Verdict>,
    turns: u32,
    fatal: bool,
}

/// Drives a [`SolverAgent`] and a [`Verifier`] until success or exhaustion
pub struct RepairLoop<V> {
    verifier: V,
    config: RepairConfig,
}

impl<V: Verifier> RepairLoop<V> {
    /// Create a controller; rejects invalid configurations
    pub fn new(config: RepairConfig, verifier: V) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { verifier, config })
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// Run the repair loop for one puzzle prompt
    ///
    /// # Arguments
    /// * `agent` - Solver agent; its conversation is reset every outer cycle
    /// * `prompt` - Full puzzle description, hints included
    pub async fn run<C: GenerationClient>(
        &self,
        agent: &mut SolverAgent<C>,
        prompt: &str,
    ) -> RepairOutcome {
        let mut budget = RetryBudget::new(
            self.config.max_tries,
            self.config.temperatures.clone(),
        );
        if let Some(t) = budget.initial_temperature() {
            agent.adjust_temperature(t);
        }

        let mut latest_artifact = String::new();
        let mut state = LoopState::Seeded;
        let mut outer_cycles = 0;
        let mut inner_turns = 0;
        let mut temperatures = Vec::new();

        while budget.has_attempts() {
            outer_cycles += 1;
            temperatures.push(agent.temperature());

            let span = info_span!(
                "repair_cycle",
                cycle = outer_cycles,
                temperature = agent.temperature() as f64,
                otel.name = "repair_cycle"
            );
            let report = self
                .run_cycle(agent, prompt, &mut latest_artifact)
                .instrument(span)
                .await;
            inner_turns += report.turns;

            if report.last_verdict.is_some_and(|v| v.is_clean()) {
                state = LoopState::Succeeded;
                info!(cycle = outer_cycles, "Verifier output clean");
                println!("[REPAIR] Cycle {} succeeded", outer_cycles);
                break;
            }

            if report.fatal {
                state = LoopState::Exhausted;
                warn!(cycle = outer_cycles, "Fatal generation error, abandoning puzzle");
                break;
            }

            match budget.record_failure() {
                Some(next) => {
                    state = LoopState::Retrying;
                    agent.adjust_temperature(next);
                    info!(
                        cycle = outer_cycles,
                        attempts_remaining = budget.attempts_remaining(),
                        temperature = next as f64,
                        "Cycle failed, retrying hotter"
                    );
                    println!(
                        "[REPAIR] Cycle {} failed, retrying at temperature {}",
                        outer_cycles, next
                    );
                }
                None => {
                    state = LoopState::Exhausted;
                    info!(cycle = outer_cycles, "Retry budget exhausted");
                    println!("[REPAIR] Retry budget exhausted after {} cycles", outer_cycles);
                }
            }
        }

        // Only a clean break leaves the loop in a non-terminal state
        if state != LoopState::Succeeded {
            state = LoopState::Exhausted;
        }

        let verifier_output = self.verifier.run(&latest_artifact).await;

        REPAIR_OUTCOMES.with_label_values(&[state.as_str()]).inc();
        REPAIR_CYCLES.observe(outer_cycles as f64);

        let conversation = agent.conversation();
        RepairOutcome {
            state,
            artifact: latest_artifact,
            verifier_output,
            transcript: conversation.format(),
            turns: conversation.live_turns().to_vec(),
            outer_cycles,
            inner_turns,
            temperatures,
        }
    }

    async fn run_cycle<C: GenerationClient>(
        &self,
        agent: &mut SolverAgent<C>,
        prompt: &str,
        latest_artifact: &mut String,
    ) -> CycleReport {
        agent.reset();
        debug!(state = LoopState::Seeded.as_str(), "Conversation reset");

        let mut current_input = prompt.to_string();
        let mut report = CycleReport {
            last_verdict: None,
            turns: 0,
            fatal: false,
        };

        for turn in 1..=self.config.max_conversation_length {
            report.turns += 1;

            match self
                .run_turn(agent, &mut current_input, latest_artifact)
                .instrument(debug_span!("repair_turn", turn))
                .await
            {
                TurnOutcome::Verified(verdict) => {
                    debug!(turn, verdict = verdict.as_str(), "Turn verified");
                    report.last_verdict = Some(verdict);
                    if verdict.is_clean() && self.config.stop_when_clean {
                        break;
                    }
                }
                TurnOutcome::RetryableFailure(reason) => {
                    warn!(turn, error = %reason, "Generation failed, continuing");
                }
                TurnOutcome::FatalFailure(reason) => {
                    warn!(turn, error = %reason, "Generation failed fatally");
                    report.fatal = true;
                    break;
                }
            }
        }

        report
    }

    /// One propose + verify exchange; the verifier output replaces `current_input`
    async fn run_turn<C: GenerationClient>(
        &self,
        agent: &mut SolverAgent<C>,
        current_input: &mut String,
        latest_artifact: &mut String,
    ) -> TurnOutcome {
        debug!(state = LoopState::Proposing.as_str(), "Proposing");
        let proposal = match agent.propose(current_input.as_str()).await {
            Ok(p) => p,
            Err(e) if e.is_fatal() => return TurnOutcome::FatalFailure(e.to_string()),
            Err(e) => return TurnOutcome::RetryableFailure(e.to_string()),
        };

        if !proposal.artifact.is_empty() && proposal.artifact.contains(LOGIC_START_MARKER) {
            *latest_artifact = proposal.artifact;
        } else {
            debug!("No artifact in response, keeping previous");
        }

        debug!(
            state = LoopState::Verifying.as_str(),
            artifact_len = latest_artifact.len(),
            "Verifying"
        );
        let output = self.verifier.run(latest_artifact.as_str()).await;
        let verdict = Verdict::classify(&output);
        *current_input = output;
        TurnOutcome::Verified(verdict)
    }
}
