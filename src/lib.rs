//! Near-duplicate detection for crawled (image, caption) records.
//!
//! A record is a duplicate of another when their perceptual image hashes are
//! within a Hamming distance threshold, or when their captions are similar
//! enough. A batch is first deduplicated against itself (first seen wins) and
//! the survivors are then checked against the corpus persisted by earlier runs.

pub mod batch;
pub mod config;
pub mod corpus;
pub mod dedup;
pub mod error;
pub mod hash;
pub mod matcher;
pub mod record;
pub mod similarity;

pub use batch::BatchDeduplicator;
pub use config::Config;
pub use corpus::{CorpusEntry, CorpusSource, MemoryCorpus, SqliteCorpus};
pub use dedup::{check_batch, DedupReport};
pub use error::{DedupError, Result};
pub use hash::{hash_distance, ImageHash};
pub use matcher::{CorpusMatch, CorpusMatcher};
pub use record::{fingerprint_batch, load_batch, save_batch, Candidate};
pub use similarity::{caption_similarity, is_similar, Fingerprint, Thresholds};
