//! Best-effort parsing of free-form model output
//!
//! Nothing in here fails: a missing marker yields an empty artifact and a
//! missing score yields `None`, so callers never special-case parser errors.

use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Opens an SMT-LIB program
pub const LOGIC_START_MARKER: &str = "(set-logic";

/// Final query command of an SMT-LIB program
pub const LOGIC_END_MARKER: &str = "(get-model)";

lazy_static! {
    static ref SCORE_PATTERN: Regex =
        Regex::new(r"\b(\d{1,3})/(\d{1,3})\b").expect("score pattern is valid");
}

/// Pull the final marker-delimited block out of `text`.
///
/// Finds the *last* `start` and then the first `end` at or after it, and
/// returns the inclusive span. Models often repeat earlier attempts before
/// their final answer, so the last start wins.
pub fn extract_substring<'a>(text: &'a str, start: &str, end: &str) -> &'a str {
    let Some(begin) = text.rfind(start) else {
        return "";
    };
    match text[begin..].find(end) {
        Some(offset) => &text[begin..begin + offset + end.len()],
        None => "",
    }
}

/// Extract the SMT-LIB program from a response, stripping markdown backticks
pub fn extract_artifact(response: &str) -> String {
    extract_substring(response, LOGIC_START_MARKER, LOGIC_END_MARKER).replace('`', "")
}

/// A score of the form `X/Y` with `X <= Y`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grade {
    pub numerator: u32,
    pub denominator: u32,
}

impl Grade {
    pub fn new(numerator: u32, denominator: u32) -> Option<Self> {
        (numerator <= denominator).then_some(Self {
            numerator,
            denominator,
        })
    }

    /// Score as a fraction in `[0, 1]`; a `0/0` grade counts as zero
    pub fn ratio(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }

    pub fn is_perfect(&self) -> bool {
        (self.ratio() - 1.0).abs() < 0.001
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (num, den) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| format!("not a fraction: {:?}", s))?;
        let num: u32 = num.trim().parse().map_err(|_| format!("bad numerator in {:?}", s))?;
        let den: u32 = den.trim().parse().map_err(|_| format!("bad denominator in {:?}", s))?;
        Grade::new(num, den).ok_or_else(|| format!("numerator exceeds denominator in {:?}", s))
    }
}

/// Find the last valid `X/Y` score in a grading response.
///
/// Ratios with `X > Y` are ignored. The last valid match wins since graders
/// tend to restate a corrected total at the end.
pub fn extract_grade(text: &str) -> Option<Grade> {
    SCORE_PATTERN
        .captures_iter(text)
        .filter_map(|caps| {
            let num = caps[1].parse().ok()?;
            let den = caps[2].parse().ok()?;
            Grade::new(num, den)
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_last_start_first_end() {
        let text = "draft (set-logic A) (get-model) final (set-logic B) x (get-model) tail (get-model)";
        assert_eq!(
            extract_substring(text, LOGIC_START_MARKER, LOGIC_END_MARKER),
            "(set-logic B) x (get-model)"
        );
    }

    #[test]
    fn test_extract_missing_markers() {
        assert_eq!(extract_substring("no code here", "(set-logic", "(get-model)"), "");
        assert_eq!(extract_substring("(set-logic QF_LIA) only", "(set-logic", "(get-model)"), "");
        // end marker only before the last start does not count
        assert_eq!(
            extract_substring("(get-model) (set-logic QF_LIA)", "(set-logic", "(get-model)"),
            ""
        );
    }

    #[test]
    fn test_extract_is_idempotent() {
        let text = "Here you go:\n```\n(set-logic QF_LIA)\n(check-sat)\n(get-model)\n```\nDone.";
        let once = extract_substring(text, LOGIC_START_MARKER, LOGIC_END_MARKER);
        let twice = extract_substring(once, LOGIC_START_MARKER, LOGIC_END_MARKER);
        assert_eq!(once, twice);
        assert!(once.starts_with(LOGIC_START_MARKER));
        assert!(once.ends_with(LOGIC_END_MARKER));
        assert_eq!(once.matches(LOGIC_START_MARKER).count(), 1);
    }

    #[test]
    fn test_extract_artifact_strips_backticks() {
        let text = "```(set-logic QF_LIA)\n(assert `x`)\n(get-model)```";
        assert_eq!(extract_artifact(text), "(set-logic QF_LIA)\n(assert x)\n(get-model)");
    }

    #[test]
    fn test_grade_last_valid_match_wins() {
        let grade = extract_grade("I first counted 17/20... actually 15/20.");
        assert_eq!(grade, Grade::new(15, 20));
    }

    #[test]
    fn test_grade_rejects_improper_fraction() {
        assert_eq!(extract_grade("the score is 7/5"), None);
        assert_eq!(extract_grade("step 3/4 then 9/8"), Grade::new(3, 4));
    }

    #[test]
    fn test_grade_none_without_pattern() {
        assert_eq!(extract_grade("ungradable output"), None);
        assert_eq!(extract_grade("ratio 1234/5678"), None);
    }

    #[test]
    fn test_grade_parse_and_display() {
        let grade: Grade = "6/6".parse().unwrap();
        assert_eq!(grade.to_string(), "6/6");
        assert!(grade.is_perfect());
        assert!("7/5".parse::<Grade>().is_err());
        assert!("Grade".parse::<Grade>().is_err());
    }
}
