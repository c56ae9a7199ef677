//! Saved puzzle transcripts
//!
//! One JSON file per attempted puzzle, written after grading so runs can be
//! inspected or regraded later.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conversation::Turn;
use crate::extract::Grade;

use super::controller::LoopState;

/// Everything recorded about one puzzle attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PuzzleTranscript {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub puzzle: String,
    pub model: String,
    /// Post-seed turns of the final cycle
    pub turns: Vec<Turn>,
    pub outer_cycles: u32,
    /// `None` for direct-mode runs
    pub state: Option<LoopState>,
    pub artifact: Option<String>,
    pub verifier_output: Option<String>,
    pub grade: Option<Grade>,
    pub grading_explanation: Option<String>,
}

impl PuzzleTranscript {
    pub fn new(puzzle: impl Into<String>, model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            created_at: now,
            updated_at: now,
            puzzle: puzzle.into(),
            model: model.into(),
            turns: Vec::new(),
            outer_cycles: 0,
            state: None,
            artifact: None,
            verifier_output: None,
            grade: None,
            grading_explanation: None,
        }
    }

    pub fn record_grade(&mut self, grade: Option<Grade>, explanation: impl Into<String>) {
        self.grade = grade;
        self.grading_explanation = Some(explanation.into());
        self.updated_at = Utc::now();
    }
}

/// Directory-backed transcript storage
pub struct TranscriptStore {
    base_dir: PathBuf,
}

impl TranscriptStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    pub fn save(&self, transcript: &PuzzleTranscript) -> std::io::Result<PathBuf> {
        let path = self.transcript_path(&transcript.id);
        let json = serde_json::to_string_pretty(transcript)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)?;
        Ok(path)
    }

    pub fn load(&self, id: &str) -> std::io::Result<PuzzleTranscript> {
        load_from_path(&self.transcript_path(id))
    }

    /// Summaries of every readable transcript, newest first
    pub fn list(&self) -> std::io::Result<Vec<TranscriptSummary>> {
        let mut summaries = Vec::new();
        for entry in std::fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                if let Ok(t) = load_from_path(&path) {
                    summaries.push(TranscriptSummary {
                        id: t.id,
                        puzzle: t.puzzle,
                        created_at: t.created_at,
                        grade: t.grade,
                        state: t.state,
                    });
                }
            }
        }
        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries)
    }

    fn transcript_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{}.json", id))
    }
}

fn load_from_path(path: &Path) -> std::io::Result<PuzzleTranscript> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSummary {
    pub id: String,
    pub puzzle: String,
    pub created_at: DateTime<Utc>,
    pub grade: Option<Grade>,
    pub state: Option<LoopState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_load_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path().join("transcripts")).unwrap();

        let mut transcript = PuzzleTranscript::new("puzzle_01", "gpt-4o");
        transcript.turns.push(Turn::user("describe"));
        transcript.turns.push(Turn::agent("(set-logic QF_LIA)"));
        transcript.state = Some(LoopState::Succeeded);
        transcript.record_grade(Grade::new(3, 4), "Grade: 3/4");
        store.save(&transcript).unwrap();

        let loaded = store.load(&transcript.id).unwrap();
        assert_eq!(loaded.puzzle, "puzzle_01");
        assert_eq!(loaded.turns, transcript.turns);
        assert_eq!(loaded.grade, Grade::new(3, 4));

        std::fs::write(dir.path().join("transcripts").join("junk.json"), "{").unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].state, Some(LoopState::Succeeded));
    }

    #[test]
    fn test_missing_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let store = TranscriptStore::new(dir.path()).unwrap();
        assert!(store.load("nope").is_err());
    }
}
