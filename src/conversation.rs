//! Conversation state shared between an agent and its generation backend
//!
//! A conversation is an ordered, append-only list of tagged turns. It may be
//! primed with a fixed few-shot seed; `clear()` always restores exactly that
//! seed.
//!
//! ```text
//! ┌──────────── seed ────────────┐┌──────── live turns ────────┐
//! │ User │ Agent │ User │ Agent  ││ User │ Agent │ User │ Agent│
//! └──────────────────────────────┘└────────────────────────────┘
//!                                  ▲ format() renders from here
//! ```

use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
}

impl Role {
    /// Role implied by a position in a plain alternating history
    pub fn from_parity(index: usize) -> Self {
        if index % 2 == 0 {
            Role::User
        } else {
            Role::Agent
        }
    }

    /// Name used by chat-style APIs
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "assistant",
        }
    }
}

/// A single message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn agent(text: impl Into<String>) -> Self {
        Self {
            role: Role::Agent,
            text: text.into(),
        }
    }
}

/// Ordered conversation log with an optional seed prefix
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    seed: Vec<Turn>,
    turns: Vec<Turn>,
}

impl Conversation {
    /// Create an empty conversation with no seed
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a conversation primed with `seed`
    pub fn with_seed(seed: Vec<Turn>) -> Self {
        Self {
            turns: seed.clone(),
            seed,
        }
    }

    /// Build a seed from plain alternating strings (even index = user)
    pub fn seed_from_texts<I, S>(texts: I) -> Vec<Turn>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| Turn {
                role: Role::from_parity(i),
                text: text.into(),
            })
            .collect()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.append(Turn::user(text));
    }

    pub fn push_agent(&mut self, text: impl Into<String>) {
        self.append(Turn::agent(text));
    }

    /// Restore the conversation to exactly its seed
    pub fn clear(&mut self) {
        self.turns = self.seed.clone();
    }

    /// Every turn, seed included
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn seed(&self) -> &[Turn] {
        &self.seed
    }

    pub fn seed_len(&self) -> usize {
        self.seed.len()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Turns appended after the seed
    pub fn live_turns(&self) -> &[Turn] {
        &self.turns[self.seed.len().min(self.turns.len())..]
    }

    /// Render the post-seed turns for logs and grading.
    ///
    /// Labels follow the parity of each turn's absolute index in the full
    /// conversation, seed included, which is how historical result files were
    /// written. With an odd-length seed this labels live turns opposite to
    /// their role tags; see [`Conversation::format_by_role`].
    pub fn format(&self) -> String {
        let mut out = String::new();
        for (i, turn) in self.turns.iter().enumerate().skip(self.seed.len()) {
            let label = if i % 2 == 0 { "User: " } else { "LLM: " };
            out.push_str(label);
            out.push_str(&turn.text);
            out.push('\n');
        }
        out
    }

    /// Render the post-seed turns labelled by their role tags
    pub fn format_by_role(&self) -> String {
        let mut out = String::new();
        for turn in self.live_turns() {
            let label = match turn.role {
                Role::User => "User: ",
                Role::Agent => "LLM: ",
            };
            out.push_str(label);
            out.push_str(&turn.text);
            out.push('\n');
        }
        out
    }
}
