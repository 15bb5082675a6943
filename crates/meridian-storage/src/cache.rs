//! Page cache: the buffer pool composed with the backing file.
//!
//! Resolves a page ID to a resident frame, loading from the backing
//! file on miss (or zero-filling past its end), writing dirty victims
//! back on eviction, and flushing everything on demand.

use crate::disk::{PageStore, PageStoreConfig};
use meridian_buffer::{BufferFrame, BufferPool, BufferPoolConfig, BufferPoolStats};
use meridian_common::page::{PageHeader, PageId, PAGE_HEADER_SIZE};
use meridian_common::{IndexConfig, Result};

/// Bounded cache of pages over a single backing file.
///
/// The sole owner of page memory. Callers never hold page bytes across
/// an operation that could evict without pinning the frame first; the
/// pinned pointer type enforces that discipline.
pub struct PageCache {
    pool: BufferPool,
    store: PageStore,
    /// Page count of the backing file when it was opened. Pages at or
    /// past this index are materialized zero-filled on first access.
    preexisting_pages: u32,
}

impl PageCache {
    /// Opens the cache over the configured backing file, with a pool
    /// of `memory_budget / PAGE_SIZE` frames.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        let store = PageStore::open(PageStoreConfig {
            path: config.backing_file.clone(),
            fsync_enabled: config.fsync_enabled,
        })?;
        let preexisting_pages = store.num_pages();

        let pool = BufferPool::new(BufferPoolConfig {
            num_frames: config.frame_count(),
        });

        tracing::debug!(
            path = %store.path().display(),
            frames = pool.num_frames(),
            preexisting_pages,
            "page cache opened"
        );

        Ok(Self {
            pool,
            store,
            preexisting_pages,
        })
    }

    /// Resolves a page ID to a resident frame.
    ///
    /// On a miss: selects a victim, writes it back if dirty, then
    /// reads the requested page from the backing file, or zero-fills
    /// it if the file does not contain it yet. The returned frame is
    /// unpinned; pin it before holding pointers into it.
    ///
    /// Fails only on I/O errors or when every frame is pinned.
    pub fn get_page(&self, page_id: PageId) -> Result<&BufferFrame> {
        if let Some(frame) = self.pool.fetch_page(page_id) {
            return Ok(frame);
        }

        let (frame, evicted) = self.pool.new_page(page_id)?;
        if let Some(ev) = evicted {
            self.store.write_page(ev.page_id, &ev.data.0)?;
        }

        if page_id.0 < self.store.num_pages() {
            let data = self.store.read_page(page_id)?;
            frame.copy_from(&data);
        } else {
            // Fresh page: the frame is already zero-filled, stamp the
            // header so the eventual on-disk image carries its id.
            let header = PageHeader::new(page_id);
            let mut data = frame.write_data();
            data[..PAGE_HEADER_SIZE].copy_from_slice(&header.to_bytes());
        }

        Ok(frame)
    }

    /// Adds a pin to the page held by the frame.
    pub fn pin_page(&self, frame: &BufferFrame) {
        frame.pin();
    }

    /// Drops a pin from the page held by the frame.
    pub fn unpin_page(&self, frame: &BufferFrame) {
        frame.unpin();
    }

    /// Marks the page held by the frame as dirty.
    pub fn mark_dirty(&self, frame: &BufferFrame) {
        frame.set_dirty(true);
    }

    /// Synchronously writes every dirty resident page to the backing
    /// file. Returns the number of pages written.
    pub fn writeback_all_pages(&self) -> Result<usize> {
        let flushed = self
            .pool
            .flush_all(|page_id, data| self.store.write_page(page_id, data))?;
        self.store.flush()?;
        tracing::debug!(flushed, "write-back complete");
        Ok(flushed)
    }

    /// Number of pages the backing file held when the cache was opened.
    pub fn preexisting_page_count(&self) -> u32 {
        self.preexisting_pages
    }

    /// Returns the in-memory pool, for inspection.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            pool: self.pool.stats(),
            preexisting_pages: self.preexisting_pages,
            file_pages: self.store.num_pages(),
        }
    }
}

/// Statistics about the page cache.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// In-memory pool statistics.
    pub pool: BufferPoolStats,
    /// Page count of the backing file at open.
    pub preexisting_pages: u32,
    /// Current page count of the backing file.
    pub file_pages: u32,
}
