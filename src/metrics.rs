//! Prometheus metrics for puzzle runs
//!
//! Registered in the default registry; [`render`] produces the text
//! exposition format, written to disk at the end of a batch when requested.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram, register_histogram_vec, CounterVec, Encoder,
    Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Generation
    // ─────────────────────────────────────────────────────────────────────────────

    /// Generation calls by model and status ("ok" or "error").
    pub static ref LLM_CALLS: CounterVec = register_counter_vec!(
        "puzzlegrader_llm_calls_total",
        "Generation calls by model and status",
        &["model", "status"]
    ).expect("failed to register LLM_CALLS metric");

    /// Wall-clock latency of generation calls.
    pub static ref LLM_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "puzzlegrader_llm_call_duration_seconds",
        "Generation call latency",
        &["model"],
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).expect("failed to register LLM_CALL_DURATION metric");

    /// Tokens by model and direction ("sent" or "received").
    pub static ref LLM_TOKENS: CounterVec = register_counter_vec!(
        "puzzlegrader_llm_tokens_total",
        "Tokens exchanged with generation backends",
        &["model", "direction"]
    ).expect("failed to register LLM_TOKENS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Verifier & repair loop
    // ─────────────────────────────────────────────────────────────────────────────

    /// Verifier runs by verdict ("clean" or "error").
    pub static ref VERIFIER_RUNS: CounterVec = register_counter_vec!(
        "puzzlegrader_verifier_runs_total",
        "Solver invocations by verdict",
        &["verdict"]
    ).expect("failed to register VERIFIER_RUNS metric");

    pub static ref VERIFIER_DURATION: Histogram = register_histogram!(
        "puzzlegrader_verifier_duration_seconds",
        "Solver invocation latency",
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).expect("failed to register VERIFIER_DURATION metric");

    /// Repair loop outcomes ("succeeded" or "exhausted").
    pub static ref REPAIR_OUTCOMES: CounterVec = register_counter_vec!(
        "puzzlegrader_repair_outcomes_total",
        "Repair loop terminal states",
        &["outcome"]
    ).expect("failed to register REPAIR_OUTCOMES metric");

    /// Outer cycles used per puzzle.
    pub static ref REPAIR_CYCLES: Histogram = register_histogram!(
        "puzzlegrader_repair_cycles",
        "Outer repair cycles per puzzle",
        vec![1.0, 2.0, 3.0, 5.0, 8.0]
    ).expect("failed to register REPAIR_CYCLES metric");

    /// Grading results ("graded", "ungraded" or "failed").
    pub static ref GRADES: CounterVec = register_counter_vec!(
        "puzzlegrader_grades_total",
        "Grading outcomes",
        &["result"]
    ).expect("failed to register GRADES metric");
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_registered_metrics() {
        VERIFIER_RUNS.with_label_values(&["clean"]).inc();
        let text = render();
        assert!(text.contains("puzzlegrader_verifier_runs_total"));
    }
}
