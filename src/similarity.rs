//! The fuzzy-equality predicate shared by both deduplication phases.

use crate::error::DedupError;
use crate::hash::ImageHash;
use strsim::normalized_levenshtein;
use tracing::debug;

pub const DEFAULT_HASH_THRESHOLD: u32 = 5;
pub const DEFAULT_CAPTION_THRESHOLD: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Maximum Hamming distance at which two hashes count as the same image.
    pub hash: u32,
    /// Minimum caption similarity ratio at which two captions count as the same.
    pub caption: f64,
}

impl Thresholds {
    pub fn new(hash: u32, caption: f64) -> Result<Self, DedupError> {
        if !(0.0..=1.0).contains(&caption) {
            return Err(DedupError::Config(format!(
                "caption threshold must be within [0, 1], got {}",
                caption
            )));
        }
        Ok(Self { hash, caption })
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            hash: DEFAULT_HASH_THRESHOLD,
            caption: DEFAULT_CAPTION_THRESHOLD,
        }
    }
}

/// The two signals of a record that take part in duplicate detection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fingerprint {
    pub hash: Option<ImageHash>,
    pub caption: Option<String>,
}

impl Fingerprint {
    pub fn new(hash: Option<ImageHash>, caption: Option<String>) -> Self {
        Self {
            hash,
            caption: caption.filter(|c| !c.is_empty()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hash.is_none() && self.caption.is_none()
    }

    pub fn is_similar(&self, other: &Fingerprint, thresholds: &Thresholds) -> bool {
        is_similar(
            self.hash.as_ref(),
            self.caption.as_deref(),
            other.hash.as_ref(),
            other.caption.as_deref(),
            thresholds,
        )
    }
}

/// Case-insensitive normalized edit-distance ratio in `[0, 1]`.
pub fn caption_similarity(a: &str, b: &str) -> f64 {
    normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Distance between two hashes if it is within `threshold`.
///
/// Hashes of differing bit length never match.
pub fn hash_match(a: &ImageHash, b: &ImageHash, threshold: u32) -> Option<u32> {
    match a.distance(b) {
        Ok(distance) if distance <= threshold => Some(distance),
        Ok(_) => None,
        Err(e) => {
            debug!("Skipping hash comparison: {}", e);
            None
        }
    }
}

/// Similarity of two captions if it reaches `threshold`. Empty captions never match.
pub fn caption_match(a: &str, b: &str, threshold: f64) -> Option<f64> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let similarity = caption_similarity(a, b);
    (similarity >= threshold).then_some(similarity)
}

/// Either signal alone is enough to call two records duplicates.
pub fn is_similar(
    h1: Option<&ImageHash>,
    c1: Option<&str>,
    h2: Option<&ImageHash>,
    c2: Option<&str>,
    thresholds: &Thresholds,
) -> bool {
    if let (Some(h1), Some(h2)) = (h1, h2) {
        if hash_match(h1, h2, thresholds.hash).is_some() {
            return true;
        }
    }

    if let (Some(c1), Some(c2)) = (c1, c2) {
        if caption_match(c1, c2, thresholds.caption).is_some() {
            return true;
        }
    }

    false
}
