//! Generating agents
//!
//! [`SolverAgent`] keeps a multi-turn conversation and pulls an SMT-LIB
//! artifact out of every response. [`DirectSolver`] answers in one turn
//! without a verifier.

use std::time::Instant;

use tracing::debug;

use crate::conversation::{Conversation, Turn};
use crate::extract::extract_artifact;
use crate::llm::{Completion, GenerationClient, LlmError, UsageLedger};
use crate::metrics::{LLM_CALLS, LLM_CALL_DURATION, LLM_TOKENS};

/// Result of one `propose` call
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    /// Full model response
    pub response: String,
    /// Extracted SMT-LIB program, empty when the markers were not found
    pub artifact: String,
}

/// Send one request, recording metrics and usage
pub(crate) async fn generate<C: GenerationClient + ?Sized>(
    client: &C,
    role: &str,
    history: &[Turn],
    usage: &mut UsageLedger,
) -> Result<Completion, LlmError> {
    let model = client.model().to_string();
    let start = Instant::now();
    let result = client.respond(role, history).await;
    LLM_CALL_DURATION
        .with_label_values(&[&model])
        .observe(start.elapsed().as_secs_f64());

    match &result {
        Ok(completion) => {
            LLM_CALLS.with_label_values(&[&model, "ok"]).inc();
            LLM_TOKENS
                .with_label_values(&[&model, "sent"])
                .inc_by(completion.usage.prompt_tokens as f64);
            LLM_TOKENS
                .with_label_values(&[&model, "received"])
                .inc_by(completion.usage.completion_tokens as f64);
            usage.record(&model, completion.usage);
            debug!(
                model = %model,
                prompt_tokens = completion.usage.prompt_tokens,
                completion_tokens = completion.usage.completion_tokens,
                "Generation call completed"
            );
        }
        Err(_) => {
            LLM_CALLS.with_label_values(&[&model, "error"]).inc();
        }
    }
    result
}

/// Agent that encodes puzzles and repairs its encoding over several turns
pub struct SolverAgent<C> {
    client: C,
    role: String,
    conversation: Conversation,
    usage: UsageLedger,
}

impl<C: GenerationClient> SolverAgent<C> {
    /// Create an agent with an optional few-shot seed
    pub fn new(client: C, role: impl Into<String>, seed: Vec<Turn>) -> Self {
        Self {
            client,
            role: role.into(),
            conversation: Conversation::with_seed(seed),
            usage: UsageLedger::new(),
        }
    }

    /// Send `input` over the whole conversation and extract the artifact.
    ///
    /// On success the conversation grows by exactly two turns. On failure it
    /// is left untouched, so user/agent alternation is preserved.
    pub async fn propose(&mut self, input: &str) -> Result<Proposal, LlmError> {
        let mut history = Vec::with_capacity(self.conversation.len() + 1);
        history.extend_from_slice(self.conversation.turns());
        history.push(Turn::user(input));

        let completion = generate(&self.client, &self.role, &history, &mut self.usage).await?;

        self.conversation.push_user(input);
        self.conversation.push_agent(completion.text.clone());

        let artifact = extract_artifact(&completion.text);
        Ok(Proposal {
            response: completion.text,
            artifact,
        })
    }

    /// Drop every turn since the seed
    pub fn reset(&mut self) {
        self.conversation.clear();
    }

    /// Temperature for subsequent calls
    pub fn adjust_temperature(&mut self, value: f32) {
        self.client.set_temperature(value);
    }

    pub fn temperature(&self) -> f32 {
        self.client.temperature()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Drain accumulated token usage
    pub fn take_usage(&mut self) -> UsageLedger {
        self.usage.take()
    }
}

/// Single-turn natural-language solver, used for baseline runs
pub struct DirectSolver<C> {
    agent: SolverAgent<C>,
}

impl<C: GenerationClient> DirectSolver<C> {
    pub fn new(client: C, role: impl Into<String>, seed: Vec<Turn>) -> Self {
        Self {
            agent: SolverAgent::new(client, role, seed),
        }
    }

    /// Ask for a full solution in one turn
    pub async fn solve(&mut self, description: &str) -> Result<String, LlmError> {
        self.agent.reset();
        let proposal = self.agent.propose(description).await?;
        Ok(proposal.response)
    }

    pub fn conversation(&self) -> &Conversation {
        self.agent.conversation()
    }

    pub fn take_usage(&mut self) -> UsageLedger {
        self.agent.take_usage()
    }
}
