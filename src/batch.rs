//! Intra-batch near-duplicate removal.

use crate::error::Result;
use crate::record::{fingerprint_batch, Candidate};
use crate::similarity::{Fingerprint, Thresholds};
use tracing::debug;

pub struct BatchDeduplicator {
    thresholds: Thresholds,
}

impl BatchDeduplicator {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Keep the first record of every group of mutually similar records, in input order.
    ///
    /// Every record joins the seen set, including dropped ones, so a duplicate of a
    /// duplicate is still caught.
    pub fn dedup(&self, batch: Vec<Candidate>) -> Result<Vec<Candidate>> {
        let survivors = self.dedup_fingerprinted(fingerprint_batch(batch)?);
        Ok(survivors.into_iter().map(|(candidate, _)| candidate).collect())
    }

    /// Same as [`dedup`](Self::dedup) for records whose signals are already parsed.
    pub fn dedup_fingerprinted(
        &self,
        batch: Vec<(Candidate, Fingerprint)>,
    ) -> Vec<(Candidate, Fingerprint)> {
        let mut seen: Vec<Fingerprint> = Vec::with_capacity(batch.len());
        let mut kept = Vec::new();

        for (candidate, fingerprint) in batch {
            let duplicate_of = seen
                .iter()
                .position(|prior| fingerprint.is_similar(prior, &self.thresholds));

            match duplicate_of {
                Some(index) => debug!(
                    "Dropping {} as a batch duplicate of record {}",
                    candidate.label(),
                    index
                ),
                None => kept.push((candidate, fingerprint.clone())),
            }
            seen.push(fingerprint);
        }

        kept
    }
}

impl Default for BatchDeduplicator {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}
