// ============================================================
// Layer 3: Error Kinds
// ============================================================
// Every contract the core can break has its own variant, so a
// failure names the rule that was violated (unknown token,
// size mismatch, missing file) instead of surfacing as a
// generic numeric panic deep inside a tensor op.
//
// Vocabulary, datasets, the model, the trainer and the
// checkpoint store return these. Code that reads files for the
// user (corpus loaders, the Ctrl-C hookup, use cases, the CLI)
// returns anyhow errors with file-path context instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GptError {
    /// Encoding met a character that was not seen when the vocabulary was built.
    #[error("unknown token {0:?}: it does not appear in the vocabulary")]
    UnknownToken(char),

    #[error("unknown token id {0}")]
    UnknownId(u32),

    #[error("unknown label id {0}")]
    UnknownLabel(u32),

    #[error("duplicate entry {0:?} in vocabulary")]
    DuplicateToken(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("sequence length {len} exceeds block size {block_size}")]
    SequenceTooLong { len: usize, block_size: usize },

    #[error("empty input sequence")]
    EmptyInput,

    #[error("{split} partition holds {len} items, too few for block size {block_size}")]
    PartitionTooShort {
        split:      &'static str,
        len:        usize,
        block_size: usize,
    },

    #[error("classification needs at least 2 distinct labels, found {found}")]
    TooFewLabels { found: usize },

    #[error("wrong task: {0}")]
    WrongTask(&'static str),

    #[error("checkpoint not found at '{}'", .0.display())]
    CheckpointMissing(PathBuf),

    #[error("checkpoint '{}' is corrupt: {reason}", .path.display())]
    CheckpointCorrupt { path: PathBuf, reason: String },

    #[error("configuration mismatch: {0}")]
    ConfigMismatch(String),

    #[error("cannot sample from distribution: {0}")]
    Sampling(String),

    #[error("tensor data: {0}")]
    Tensor(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type GptResult<T> = std::result::Result<T, GptError>;
