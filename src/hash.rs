//! Perceptual hash values as handed over by the crawler.
//!
//! The engine never computes a perceptual hash itself. It only parses the
//! hexadecimal form the crawler stores (`"ffd8c0c0e0f0f8fc"`) and compares two
//! values bit by bit.

use crate::error::{DedupError, Result};
use std::fmt;

/// A fixed-length perceptual hash bit string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageHash {
    bytes: Vec<u8>,
}

impl ImageHash {
    /// Parse a hex string. Case and surrounding whitespace are ignored.
    pub fn from_hex(hex_str: &str) -> std::result::Result<Self, hex::FromHexError> {
        let trimmed = hex_str.trim();
        if trimmed.is_empty() {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        Ok(Self {
            bytes: hex::decode(trimmed)?,
        })
    }

    /// Parse an optional hash field where an empty string means "no hash".
    pub fn parse_field(
        field: Option<&str>,
    ) -> std::result::Result<Option<Self>, hex::FromHexError> {
        match field.map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => Self::from_hex(s).map(Some),
        }
    }

    pub fn bit_len(&self) -> usize {
        self.bytes.len() * 8
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }

    /// Hamming distance to `other`. Hashes of different bit length are never
    /// compared.
    pub fn distance(&self, other: &Self) -> Result<u32> {
        hash_distance(&self.bytes, &other.bytes)
    }
}

impl fmt::Display for ImageHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Count of differing bits between two equal-length hash byte strings.
pub fn hash_distance(left: &[u8], right: &[u8]) -> Result<u32> {
    if left.len() != right.len() {
        return Err(DedupError::LengthMismatch {
            left_bits: left.len() * 8,
            right_bits: right.len() * 8,
        });
    }

    Ok(left
        .iter()
        .zip(right.iter())
        .map(|(a, b)| (a ^ b).count_ones())
        .sum())
}
