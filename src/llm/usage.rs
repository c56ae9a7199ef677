//! Token usage accounting
//!
//! Usage travels with each [`Completion`](super::Completion); whoever owns a
//! [`UsageLedger`] decides when to persist it. Persisting merges into the
//! existing `Model,Tokens Sent,Tokens Received` file so totals accumulate
//! across runs.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::client::TokenUsage;

/// Per-model token totals
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageLedger {
    entries: BTreeMap<String, TokenUsage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRow {
    #[serde(rename = "Model")]
    model: String,
    #[serde(rename = "Tokens Sent")]
    tokens_sent: u64,
    #[serde(rename = "Tokens Received")]
    tokens_received: u64,
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one call's usage under `model`
    pub fn record(&mut self, model: &str, usage: TokenUsage) {
        let entry = self.entries.entry(model.to_string()).or_default();
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
    }

    /// Fold another ledger into this one
    pub fn merge(&mut self, other: UsageLedger) {
        for (model, usage) in other.entries {
            self.record(&model, usage);
        }
    }

    pub fn get(&self, model: &str) -> Option<TokenUsage> {
        self.entries.get(model).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Move the totals out, leaving the ledger empty
    pub fn take(&mut self) -> UsageLedger {
        std::mem::take(self)
    }

    /// Merge the totals into the CSV at `path` and clear the ledger.
    ///
    /// Rows for models not in this ledger are preserved; rows keep their
    /// original order and new models are appended.
    pub fn persist(&mut self, path: &Path) -> Result<(), csv::Error> {
        if self.entries.is_empty() {
            return Ok(());
        }

        let mut rows: Vec<LedgerRow> = Vec::new();
        if path.exists() {
            let mut reader = csv::Reader::from_path(path)?;
            for row in reader.deserialize() {
                rows.push(row?);
            }
        }

        let mut pending = std::mem::take(&mut self.entries);
        for row in rows.iter_mut() {
            if let Some(usage) = pending.remove(&row.model) {
                row.tokens_sent += usage.prompt_tokens;
                row.tokens_received += usage.completion_tokens;
            }
        }
        rows.extend(pending.into_iter().map(|(model, usage)| LedgerRow {
            model,
            tokens_sent: usage.prompt_tokens,
            tokens_received: usage.completion_tokens,
        }));

        let mut writer = csv::Writer::from_path(path)?;
        for row in &rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(sent: u64, received: u64) -> TokenUsage {
        TokenUsage {
            prompt_tokens: sent,
            completion_tokens: received,
        }
    }

    #[test]
    fn test_record_accumulates_per_model() {
        let mut ledger = UsageLedger::new();
        ledger.record("gpt-4o", usage(10, 5));
        ledger.record("gpt-4o", usage(1, 1));
        ledger.record("llama3", usage(3, 3));
        assert_eq!(ledger.get("gpt-4o"), Some(usage(11, 6)));
        assert_eq!(ledger.get("llama3"), Some(usage(3, 3)));
    }

    #[test]
    fn test_persist_merges_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens_count.csv");
        std::fs::write(
            &path,
            "Model,Tokens Sent,Tokens Received\nother,100,50\ngpt-4o,10,10\n",
        )
        .unwrap();

        let mut ledger = UsageLedger::new();
        ledger.record("gpt-4o", usage(5, 2));
        ledger.record("new-model", usage(7, 1));
        ledger.persist(&path).unwrap();
        assert!(ledger.is_empty());

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            written,
            "Model,Tokens Sent,Tokens Received\nother,100,50\ngpt-4o,15,12\nnew-model,7,1\n"
        );
    }

    #[test]
    fn test_persist_empty_ledger_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens_count.csv");
        UsageLedger::new().persist(&path).unwrap();
        assert!(!path.exists());
    }
}
