//! Configuration structures for meridian.

use crate::page::PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for a disk-backed index instance.
///
/// The branch factors and dimensionality are compile-time parameters
/// (`RStarTree<M, N>` and `geom::DIMENSIONS`); everything that can vary
/// per instance lives here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Buffer pool budget in bytes. The pool holds
    /// `memory_budget / PAGE_SIZE` pages (at least one).
    pub memory_budget: usize,
    /// Path to the backing page file. The root handle is persisted
    /// next to it in `<backing_file>.meta`.
    pub backing_file: PathBuf,
    /// Enable fsync after page writes.
    pub fsync_enabled: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            memory_budget: 16 * 1024 * 1024, // 16 MB, 4096 pages
            backing_file: PathBuf::from("./meridian.db"),
            fsync_enabled: true,
        }
    }
}

impl IndexConfig {
    /// Creates a config for the given backing file with the given budget.
    pub fn new(memory_budget: usize, backing_file: impl Into<PathBuf>) -> Self {
        Self {
            memory_budget,
            backing_file: backing_file.into(),
            fsync_enabled: true,
        }
    }

    /// Number of buffer pool frames the budget pays for.
    pub fn frame_count(&self) -> usize {
        (self.memory_budget / PAGE_SIZE).max(1)
    }
}
