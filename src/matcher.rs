//! Matching batch survivors against the persisted corpus.

use crate::corpus::{CorpusEntry, CorpusSource};
use crate::error::Result;
use crate::record::{fingerprint_batch, Candidate};
use crate::similarity::{caption_match, hash_match, Fingerprint, Thresholds};
use rayon::prelude::*;
use std::fmt;
use tracing::{debug, info, warn};

/// Why a candidate was rejected against the corpus.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CorpusMatch {
    Hash { id: i64, distance: u32 },
    Caption { id: i64, similarity: f64 },
}

impl fmt::Display for CorpusMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorpusMatch::Hash { id, distance } => {
                write!(f, "image hash of record {} (distance {})", id, distance)
            }
            CorpusMatch::Caption { id, similarity } => write!(
                f,
                "caption of record {} (similarity {:.3})",
                id, similarity
            ),
        }
    }
}

#[derive(Debug, Default)]
pub struct CorpusOutcome {
    pub accepted: Vec<Candidate>,
    pub rejected: Vec<(Candidate, CorpusMatch)>,
    /// The corpus did not exist, so everything was accepted.
    pub corpus_absent: bool,
}

pub struct CorpusMatcher {
    thresholds: Thresholds,
}

impl CorpusMatcher {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// First corpus record the fingerprint matches.
    ///
    /// All hashes are scanned before any caption, so a hash hit is always
    /// reported in preference to a caption hit.
    pub fn find_match(
        &self,
        fingerprint: &Fingerprint,
        corpus: &[CorpusEntry],
    ) -> Option<CorpusMatch> {
        if let Some(hash) = &fingerprint.hash {
            let hit = corpus.iter().find_map(|entry| {
                let stored = entry.fingerprint.hash.as_ref()?;
                hash_match(hash, stored, self.thresholds.hash).map(|distance| {
                    CorpusMatch::Hash {
                        id: entry.id,
                        distance,
                    }
                })
            });
            if hit.is_some() {
                return hit;
            }
        }

        if let Some(caption) = &fingerprint.caption {
            return corpus.iter().find_map(|entry| {
                let stored = entry.fingerprint.caption.as_deref()?;
                caption_match(caption, stored, self.thresholds.caption).map(|similarity| {
                    CorpusMatch::Caption {
                        id: entry.id,
                        similarity,
                    }
                })
            });
        }

        None
    }

    /// Drop every candidate that matches a persisted record, keeping input order.
    ///
    /// A corpus that does not exist yet accepts everything. Any failure to read
    /// an existing corpus aborts the whole check.
    pub fn filter<S: CorpusSource + ?Sized>(
        &self,
        candidates: Vec<Candidate>,
        source: &S,
    ) -> Result<CorpusOutcome> {
        self.filter_fingerprinted(fingerprint_batch(candidates)?, source)
    }

    /// Same as [`filter`](Self::filter) for records whose signals are already parsed.
    pub fn filter_fingerprinted<S: CorpusSource + ?Sized>(
        &self,
        batch: Vec<(Candidate, Fingerprint)>,
        source: &S,
    ) -> Result<CorpusOutcome> {
        let (candidates, fingerprints): (Vec<Candidate>, Vec<Fingerprint>) =
            batch.into_iter().unzip();

        let Some(corpus) = source.load()? else {
            warn!(
                "Corpus does not exist yet; accepting all {} record(s)",
                candidates.len()
            );
            return Ok(CorpusOutcome {
                accepted: candidates,
                rejected: Vec::new(),
                corpus_absent: true,
            });
        };

        debug!(
            "Matching {} record(s) against {} corpus record(s)",
            candidates.len(),
            corpus.len()
        );

        let matches: Vec<Option<CorpusMatch>> = fingerprints
            .par_iter()
            .map(|fp| self.find_match(fp, &corpus))
            .collect();

        let mut outcome = CorpusOutcome::default();
        for (candidate, found) in candidates.into_iter().zip(matches) {
            match found {
                Some(hit) => {
                    info!("Rejected {}: matches {}", candidate.label(), hit);
                    outcome.rejected.push((candidate, hit));
                }
                None => outcome.accepted.push(candidate),
            }
        }

        Ok(outcome)
    }
}

impl Default for CorpusMatcher {
    fn default() -> Self {
        Self::new(Thresholds::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::MemoryCorpus;
    use crate::error::DedupError;
    use crate::hash::ImageHash;

    const STORED_HASH: &str = "0000000000000000";

    fn fingerprint(hash: Option<&str>, caption: Option<&str>) -> Fingerprint {
        Fingerprint::new(
            hash.map(|h| ImageHash::from_hex(h).unwrap()),
            caption.map(str::to_string),
        )
    }

    fn storm_corpus() -> MemoryCorpus {
        let mut corpus = MemoryCorpus::default();
        corpus.push(fingerprint(Some(STORED_HASH), Some("Storm hits coast")));
        corpus
    }

    struct FailingCorpus;

    impl CorpusSource for FailingCorpus {
        fn load(&self) -> Result<Option<Vec<CorpusEntry>>> {
            Err(DedupError::MalformedCorpusRecord {
                id: 7,
                reason: "truncated row".to_string(),
            })
        }
    }

    #[test]
    fn test_hash_match_rejects_despite_unrelated_caption() {
        let batch = vec![Candidate::new(
            Some("0700000000000000"),
            Some("Local bakery wins award"),
        )];
        let outcome = CorpusMatcher::default().filter(batch, &storm_corpus()).unwrap();

        assert!(outcome.accepted.is_empty());
        assert_eq!(
            outcome.rejected[0].1,
            CorpusMatch::Hash { id: 1, distance: 3 }
        );
    }

    #[test]
    fn test_caption_match_rejects_despite_distant_hash() {
        let batch = vec![Candidate::new(
            Some("ff00000000000000"),
            Some("storm hits coast!!"),
        )];
        let outcome = CorpusMatcher::default().filter(batch, &storm_corpus()).unwrap();

        assert!(outcome.accepted.is_empty());
        assert!(matches!(
            outcome.rejected[0].1,
            CorpusMatch::Caption { id: 1, similarity } if similarity >= 0.8
        ));
    }

    #[test]
    fn test_hash_scan_precedes_caption_scan() {
        let mut corpus = MemoryCorpus::default();
        corpus.push(fingerprint(None, Some("Storm hits coast")));
        corpus.push(fingerprint(Some(STORED_HASH), Some("Unrelated")));

        let found = CorpusMatcher::default().find_match(
            &fingerprint(Some(STORED_HASH), Some("Storm hits coast")),
            &corpus.load().unwrap().unwrap(),
        );
        assert_eq!(found, Some(CorpusMatch::Hash { id: 2, distance: 0 }));
    }

    #[test]
    fn test_unrelated_record_accepted() {
        let batch = vec![Candidate::new(
            Some("ffffffffffffffff"),
            Some("Local bakery wins award"),
        )];
        let outcome = CorpusMatcher::default().filter(batch.clone(), &storm_corpus()).unwrap();

        assert_eq!(outcome.accepted, batch);
        assert!(!outcome.corpus_absent);
    }

    #[test]
    fn test_length_mismatch_falls_through_to_caption() {
        let batch = vec![
            Candidate::new(Some("00000000"), Some("Completely different")),
            Candidate::new(Some("00000000"), Some("Storm hits coast")),
        ];
        let outcome = CorpusMatcher::default().filter(batch, &storm_corpus()).unwrap();

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(
            outcome.accepted[0].caption(),
            Some("Completely different")
        );
    }

    #[test]
    fn test_absent_corpus_accepts_everything() {
        let batch = vec![
            Candidate::new(Some(STORED_HASH), Some("Storm hits coast")),
            Candidate::new(Some(STORED_HASH), Some("Storm hits coast")),
        ];
        let outcome = CorpusMatcher::default()
            .filter(batch.clone(), &MemoryCorpus::absent())
            .unwrap();

        assert_eq!(outcome.accepted, batch);
        assert!(outcome.corpus_absent);
    }

    #[test]
    fn test_empty_corpus_accepts_everything() {
        let batch = vec![Candidate::new(Some(STORED_HASH), Some("anything"))];
        let outcome = CorpusMatcher::default()
            .filter(batch.clone(), &MemoryCorpus::from_entries(Vec::new()))
            .unwrap();

        assert_eq!(outcome.accepted, batch);
        assert!(!outcome.corpus_absent);
    }

    #[test]
    fn test_signal_free_record_never_rejected() {
        let batch = vec![Candidate::new(None, None)];
        let outcome = CorpusMatcher::default().filter(batch, &storm_corpus()).unwrap();
        assert_eq!(outcome.accepted.len(), 1);
    }

    #[test]
    fn test_order_preserved_among_survivors() {
        let batch: Vec<Candidate> = (0..50u8)
            .map(|i| {
                let hash = if i % 3 == 0 {
                    STORED_HASH.to_string()
                } else {
                    format!("ffffffffffffff{:02x}", i)
                };
                Candidate::new(Some(hash.as_str()), Some(format!("item {}", i).as_str()))
                    .with_field("position", i)
            })
            .collect();
        let outcome = CorpusMatcher::default().filter(batch, &storm_corpus()).unwrap();

        let positions: Vec<u64> = outcome
            .accepted
            .iter()
            .map(|c| c.get("position").and_then(|v| v.as_u64()).unwrap())
            .collect();
        let expected: Vec<u64> = (0..50).filter(|i| i % 3 != 0).collect();
        assert_eq!(positions, expected);
    }

    #[test]
    fn test_prepared_fingerprints_are_not_reparsed() {
        // the raw hash text is never looked at again once a fingerprint exists
        let candidate = Candidate::new(Some("not-hex"), Some("Local bakery wins award"));
        let prepared = fingerprint(Some(STORED_HASH), None);

        let outcome = CorpusMatcher::default()
            .filter_fingerprinted(vec![(candidate, prepared)], &storm_corpus())
            .unwrap();

        assert!(outcome.accepted.is_empty());
        assert_eq!(
            outcome.rejected[0].1,
            CorpusMatch::Hash { id: 1, distance: 0 }
        );
    }

    #[test]
    fn test_corpus_failure_aborts() {
        let batch = vec![Candidate::new(None, Some("anything"))];
        assert!(CorpusMatcher::default().filter(batch, &FailingCorpus).is_err());
    }
}
