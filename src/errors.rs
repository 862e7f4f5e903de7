//! Error kinds surfaced by the decoder and replay reducer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GossipError {
    #[error("truncated input at offset {offset}")]
    TruncatedInput { offset: u64 },

    #[error("channel_update for {scid} has no matching channel_announcement")]
    OrphanUpdate { scid: String },

    #[error("no channels survived pruning; pick a timestamp covered by the dataset")]
    EmptySnapshot,

    #[error("could not recover edge for {scid}: {reason}")]
    RecoveryFailed { scid: String, reason: String },

    #[error("malformed cache line: {line}")]
    CacheCorrupt { line: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}
