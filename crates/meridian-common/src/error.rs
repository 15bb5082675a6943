//! Error types for meridian.

use thiserror::Error;

/// Result type alias using MeridianError.
pub type Result<T> = std::result::Result<T, MeridianError>;

/// Errors that can occur in meridian operations.
///
/// Recoverable outcomes (a search with no matches, deleting an absent
/// point) are expressed as ordinary return values, never as errors.
/// Everything here is fatal to the index: continuing with a corrupt
/// storage layer is unsafe, so callers are expected to surface these
/// and stop.
#[derive(Debug, Error)]
pub enum MeridianError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("buffer pool exhausted: all {capacity} frames are pinned")]
    PoolExhausted { capacity: usize },

    #[error("page {page_id} is beyond the end of the backing file")]
    PageOutOfBounds { page_id: u32 },

    #[error("meta file corrupted: {path}")]
    CorruptMeta { path: String },
}
