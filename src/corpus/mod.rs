//! Read access to the records persisted by earlier runs.

pub mod sqlite;

pub use sqlite::SqliteCorpus;

use crate::error::Result;
use crate::similarity::Fingerprint;

/// Projection of one persisted record onto the signals the engine compares.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub id: i64,
    pub fingerprint: Fingerprint,
}

impl CorpusEntry {
    pub fn new(id: i64, fingerprint: Fingerprint) -> Self {
        Self { id, fingerprint }
    }
}

/// A store of previously accepted records.
pub trait CorpusSource {
    /// Load every persisted `(image_hash, caption)` pair.
    ///
    /// `Ok(None)` means the corpus does not exist yet; that is not an error.
    fn load(&self) -> Result<Option<Vec<CorpusEntry>>>;
}

/// Corpus held in memory, mostly for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryCorpus {
    entries: Option<Vec<CorpusEntry>>,
}

impl MemoryCorpus {
    /// A corpus that has never been created.
    pub fn absent() -> Self {
        Self { entries: None }
    }

    pub fn from_entries(entries: Vec<CorpusEntry>) -> Self {
        Self {
            entries: Some(entries),
        }
    }

    pub fn push(&mut self, fingerprint: Fingerprint) {
        let entries = self.entries.get_or_insert_with(Vec::new);
        let id = entries.len() as i64 + 1;
        entries.push(CorpusEntry::new(id, fingerprint));
    }
}

impl CorpusSource for MemoryCorpus {
    fn load(&self) -> Result<Option<Vec<CorpusEntry>>> {
        Ok(self.entries.clone())
    }
}
