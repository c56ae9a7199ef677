//! Grading agent
//!
//! Grading is a fresh one-shot request: transcript, optional solver output
//! and answer key are packed into a single user turn.

use crate::conversation::Turn;
use crate::extract::{extract_grade, Grade};
use crate::llm::{GenerationClient, LlmError, UsageLedger};

use super::solver::generate;

/// Grader response and the score pulled out of it
#[derive(Debug, Clone, PartialEq)]
pub struct GradeReport {
    pub explanation: String,
    pub grade: Option<Grade>,
}

pub struct GradingAgent<C> {
    client: C,
    role: String,
    usage: UsageLedger,
}

impl<C: GenerationClient> GradingAgent<C> {
    pub fn new(client: C, role: impl Into<String>) -> Self {
        Self {
            client,
            role: role.into(),
            usage: UsageLedger::new(),
        }
    }

    /// Grade `transcript` against `answer_key`.
    ///
    /// `grade` is `None` when the response holds no valid `X/Y` score.
    pub async fn get_grade(
        &mut self,
        answer_key: &str,
        transcript: &str,
        verifier_output: Option<&str>,
    ) -> Result<GradeReport, LlmError> {
        let request = grading_request(answer_key, transcript, verifier_output);
        let history = [Turn::user(request)];
        let completion = generate(&self.client, &self.role, &history, &mut self.usage).await?;

        Ok(GradeReport {
            grade: extract_grade(&completion.text),
            explanation: completion.text,
        })
    }

    pub fn take_usage(&mut self) -> UsageLedger {
        self.usage.take()
    }
}

fn grading_request(answer_key: &str, transcript: &str, verifier_output: Option<&str>) -> String {
    let solver_section = match verifier_output {
        Some(output) if !output.is_empty() => format!("\nSMT-LIB Solver Output: {}", output),
        _ => String::new(),
    };
    format!(
        "Answer to be graded: {}{}\nAnswer Key: {}",
        transcript, solver_section, answer_key
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grading_request_layout() {
        assert_eq!(
            grading_request("A-1", "User: p\n", Some("sat")),
            "Answer to be graded: User: p\n\nSMT-LIB Solver Output: sat\nAnswer Key: A-1"
        );
        assert_eq!(
            grading_request("A-1", "convo", None),
            "Answer to be graded: convo\nAnswer Key: A-1"
        );
        assert_eq!(
            grading_request("A-1", "convo", Some("")),
            "Answer to be graded: convo\nAnswer Key: A-1"
        );
    }
}
