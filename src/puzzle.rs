//! Puzzle directories on disk
//!
//! ```text
//! <root>/<puzzle>/answers.txt
//!                 entities.txt
//!                 clues.txt
//! ```

use std::path::{Path, PathBuf};

use tracing::warn;

pub const ANSWERS_FILE: &str = "answers.txt";
pub const ENTITIES_FILE: &str = "entities.txt";
pub const CLUES_FILE: &str = "clues.txt";

#[derive(Debug, thiserror::Error)]
pub enum PuzzleError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One logic puzzle and its answer key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PuzzleRecord {
    /// Directory name
    pub name: String,
    pub answer_key: String,
    pub entities: String,
    pub clues: String,
}

impl PuzzleRecord {
    /// Entities then clues, as shown to the solver
    pub fn description(&self) -> String {
        format!("{}\n{}", self.entities, self.clues)
    }

    /// Read one puzzle directory; `Ok(None)` when a file is missing
    pub fn from_dir(dir: &Path) -> Result<Option<Self>, PuzzleError> {
        let paths = [ANSWERS_FILE, ENTITIES_FILE, CLUES_FILE].map(|f| dir.join(f));
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            warn!(puzzle = %dir.display(), missing = %missing.display(), "Skipping incomplete puzzle");
            return Ok(None);
        }
        let [answers, entities, clues] = paths;

        Ok(Some(Self {
            name: dir
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            answer_key: read(&answers)?,
            entities: read(&entities)?,
            clues: read(&clues)?,
        }))
    }
}

fn read(path: &Path) -> Result<String, PuzzleError> {
    std::fs::read_to_string(path).map_err(|source| PuzzleError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load every complete puzzle under `root`, sorted by directory name.
///
/// Incomplete or unreadable puzzle directories are skipped; only an
/// unreadable `root` is an error.
pub fn load_puzzles(root: &Path) -> Result<Vec<PuzzleRecord>, PuzzleError> {
    let entries = std::fs::read_dir(root).map_err(|source| PuzzleError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| PuzzleError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();

    let mut puzzles = Vec::with_capacity(dirs.len());
    for dir in dirs {
        match PuzzleRecord::from_dir(&dir) {
            Ok(Some(puzzle)) => puzzles.push(puzzle),
            Ok(None) => {}
            Err(e) => {
                warn!(puzzle = %dir.display(), error = %e, "Skipping unreadable puzzle");
            }
        }
    }
    Ok(puzzles)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_puzzle(root: &Path, name: &str, files: &[&str]) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        for f in files {
            std::fs::write(dir.join(f), format!("{} of {}", f, name)).unwrap();
        }
    }

    #[test]
    fn test_load_sorted_and_skips_incomplete() {
        let root = tempfile::tempdir().unwrap();
        write_puzzle(root.path(), "b", &[ANSWERS_FILE, ENTITIES_FILE, CLUES_FILE]);
        write_puzzle(root.path(), "a", &[ANSWERS_FILE, ENTITIES_FILE, CLUES_FILE]);
        write_puzzle(root.path(), "c", &[ANSWERS_FILE, ENTITIES_FILE]);
        std::fs::write(root.path().join("stray.txt"), "x").unwrap();

        let puzzles = load_puzzles(root.path()).unwrap();
        let names: Vec<_> = puzzles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(puzzles[0].answer_key, "answers.txt of a");
    }

    #[test]
    fn test_load_skips_unreadable_puzzle() {
        let root = tempfile::tempdir().unwrap();
        for name in ["a", "b", "c"] {
            write_puzzle(root.path(), name, &[ANSWERS_FILE, ENTITIES_FILE, CLUES_FILE]);
        }
        std::fs::write(root.path().join("b").join(ANSWERS_FILE), [0xff, 0xfe, 0x41]).unwrap();

        let puzzles = load_puzzles(root.path()).unwrap();
        let names: Vec<_> = puzzles.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c"]);
    }

    #[test]
    fn test_description() {
        let puzzle = PuzzleRecord {
            name: "p".into(),
            answer_key: "k".into(),
            entities: "Ages: 1, 2".into(),
            clues: "1. Ann is older".into(),
        };
        assert_eq!(puzzle.description(), "Ages: 1, 2\n1. Ann is older");
    }

    #[test]
    fn test_missing_root() {
        assert!(load_puzzles(Path::new("/nonexistent/puzzles")).is_err());
    }
}
