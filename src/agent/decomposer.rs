//! Optional hint generation before solving

use crate::conversation::Turn;
use crate::llm::{GenerationClient, LlmError, UsageLedger};

use super::solver::generate;

/// Header placed before the hint lines in the solver prompt
pub const HINTS_HEADER: &str = "\"Guiding Questions:\"";

pub struct Decomposer<C> {
    client: C,
    role: String,
    usage: UsageLedger,
}

impl<C: GenerationClient> Decomposer<C> {
    pub fn new(client: C, role: impl Into<String>) -> Self {
        Self {
            client,
            role: role.into(),
            usage: UsageLedger::new(),
        }
    }

    /// One request; the response split into lines
    pub async fn decompose(&mut self, description: &str) -> Result<Vec<String>, LlmError> {
        let history = [Turn::user(description)];
        let completion = generate(&self.client, &self.role, &history, &mut self.usage).await?;
        Ok(completion.text.split('\n').map(str::to_string).collect())
    }

    pub fn take_usage(&mut self) -> UsageLedger {
        self.usage.take()
    }
}

/// Append the hint block to a puzzle description
///
/// Hints start on the line after [`HINTS_HEADER`], and an empty hint list
/// leaves the description untouched. Older prompts ran the hints straight
/// onto the header line and always appended the header, so transcripts from
/// those runs differ in this block.
pub fn with_hints(description: &str, hints: &[String]) -> String {
    if hints.is_empty() {
        return description.to_string();
    }
    format!("{}\n{}\n{}", description, HINTS_HEADER, hints.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_hints() {
        let hints = vec!["Who is oldest?".to_string(), "Who is 12 feet?".to_string()];
        assert_eq!(
            with_hints("puzzle", &hints),
            "puzzle\n\"Guiding Questions:\"\nWho is oldest?\nWho is 12 feet?"
        );
        assert_eq!(with_hints("puzzle", &[]), "puzzle");
    }
}
