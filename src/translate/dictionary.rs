//! Dictionary loading.
//! Maps surface tokens to tag names. Entry order is the match precedence
//! used by the tagger, so it is preserved exactly as loaded.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

/// One `{ "key": ..., "value": ... }` record of the dictionary file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DictionaryEntry {
    pub key: String,
    pub value: String,
}

/// Immutable, ordered token → tag mapping.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: Vec<DictionaryEntry>,
}

#[derive(Debug)]
pub enum DictionaryError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl std::fmt::Display for DictionaryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DictionaryError::Io(e) => write!(f, "dictionary IO error: {e}"),
            DictionaryError::Parse(e) => write!(f, "dictionary parse error: {e}"),
        }
    }
}

impl std::error::Error for DictionaryError {}

impl From<std::io::Error> for DictionaryError {
    fn from(e: std::io::Error) -> Self {
        DictionaryError::Io(e)
    }
}

impl From<serde_json::Error> for DictionaryError {
    fn from(e: serde_json::Error) -> Self {
        DictionaryError::Parse(e)
    }
}

impl Dictionary {
    /// Load the dictionary from a JSON array of entries.
    pub fn load_from_file(path: &Path) -> Result<Self, DictionaryError> {
        let content = std::fs::read_to_string(path)?;
        let dictionary = Self::from_json(&content)?;
        info!(path = %path.display(), entries = dictionary.len(), "dictionary loaded");
        Ok(dictionary)
    }

    pub fn from_json(content: &str) -> Result<Self, DictionaryError> {
        let entries: Vec<DictionaryEntry> = serde_json::from_str(content)?;
        Ok(Self::from_entries(entries))
    }

    /// Build from entries in precedence order.
    /// Empty keys are dropped; for duplicate keys the first one stays.
    pub fn from_entries(entries: impl IntoIterator<Item = DictionaryEntry>) -> Self {
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for entry in entries {
            if entry.key.is_empty() {
                warn!(value = %entry.value, "skipping dictionary entry with empty key");
                continue;
            }
            if !seen.insert(entry.key.clone()) {
                warn!(key = %entry.key, "skipping duplicate dictionary key");
                continue;
            }
            kept.push(entry);
        }
        Self { entries: kept }
    }

    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
