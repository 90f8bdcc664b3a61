use thiserror::Error;

#[derive(Debug, Error)]
pub enum DedupError {
    #[error("Malformed input: {0}")]
    InputMalformed(String),

    #[error("Corpus unavailable: {0}")]
    CorpusUnavailable(#[from] rusqlite::Error),

    #[error("Malformed corpus record {id}: {reason}")]
    MalformedCorpusRecord { id: i64, reason: String },

    #[error("Hash length mismatch: {left_bits} bits vs {right_bits} bits")]
    LengthMismatch { left_bits: usize, right_bits: usize },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DedupError>;
