//! Two-phase duplicate check: within the batch, then against the corpus.

use crate::batch::BatchDeduplicator;
use crate::corpus::CorpusSource;
use crate::error::Result;
use crate::matcher::{CorpusMatch, CorpusMatcher};
use crate::record::{fingerprint_batch, Candidate};
use crate::similarity::Thresholds;
use tracing::info;

#[derive(Debug)]
pub struct DedupReport {
    pub accepted: Vec<Candidate>,
    pub batch_duplicates: usize,
    pub corpus_duplicates: Vec<(Candidate, CorpusMatch)>,
    pub corpus_absent: bool,
}

impl DedupReport {
    pub fn removed(&self) -> usize {
        self.batch_duplicates + self.corpus_duplicates.len()
    }
}

/// Run both phases over `batch`.
///
/// Every record is validated up front and its signals parsed once for both phases.
/// Either the complete filtered batch is returned or an error; never a partial result.
pub fn check_batch<S: CorpusSource + ?Sized>(
    batch: Vec<Candidate>,
    corpus: &S,
    thresholds: Thresholds,
) -> Result<DedupReport> {
    let total = batch.len();
    let batch = fingerprint_batch(batch)?;

    let survivors = BatchDeduplicator::new(thresholds).dedup_fingerprinted(batch);
    let batch_duplicates = total - survivors.len();
    info!(
        "Batch phase kept {} of {} record(s)",
        survivors.len(),
        total
    );

    let outcome = CorpusMatcher::new(thresholds).filter_fingerprinted(survivors, corpus)?;
    info!(
        "Corpus phase kept {} record(s), rejected {}",
        outcome.accepted.len(),
        outcome.rejected.len()
    );

    Ok(DedupReport {
        accepted: outcome.accepted,
        batch_duplicates,
        corpus_duplicates: outcome.rejected,
        corpus_absent: outcome.corpus_absent,
    })
}
