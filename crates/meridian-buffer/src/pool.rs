//! Buffer pool manager.

use crate::frame::{BufferFrame, FrameId};
use crate::page_table::PageTable;
use crate::replacer::{ClockReplacer, Replacer};
use meridian_common::page::{PageBuf, PageId, PAGE_SIZE};
use meridian_common::{MeridianError, Result};
use parking_lot::Mutex;
use sysinfo::System;

/// Information about a dirty page that was evicted from the buffer pool.
/// Caller must write this to disk to prevent data loss.
#[derive(Debug)]
pub struct EvictedPage {
    pub page_id: PageId,
    pub data: Box<PageBuf>,
}

/// Configuration for the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the pool.
    pub num_frames: usize,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self { num_frames: 1024 }
    }
}

/// Buffer pool manager.
///
/// Manages a fixed-size pool of page frames with:
/// - Page ID to frame ID mapping
/// - Free frame list for new pages
/// - Clock replacement for eviction
/// - Pin counting, owned by the frames themselves
///
/// Frames are returned unpinned; pinning is the caller's job (in
/// practice a pinned pointer construction). A frame with a live pin is
/// never selected as an eviction victim.
pub struct BufferPool {
    /// Configuration.
    config: BufferPoolConfig,
    /// Array of buffer frames.
    frames: Vec<BufferFrame>,
    /// Page ID to frame ID mapping.
    page_table: PageTable,
    /// List of free frame IDs.
    free_list: Mutex<Vec<FrameId>>,
    /// Page replacement policy.
    replacer: ClockReplacer,
}

impl BufferPool {
    /// Creates a new buffer pool.
    pub fn new(config: BufferPoolConfig) -> Self {
        let num_frames = config.num_frames;

        let frames: Vec<_> = (0..num_frames)
            .map(|i| BufferFrame::new(FrameId(i as u32)))
            .collect();

        // All frames start in the free list.
        let free_list: Vec<_> = (0..num_frames).map(|i| FrameId(i as u32)).collect();

        Self {
            config,
            frames,
            page_table: PageTable::new(num_frames),
            free_list: Mutex::new(free_list),
            replacer: ClockReplacer::new(num_frames),
        }
    }

    /// Creates a buffer pool sized to 25% of available system RAM.
    ///
    /// Minimum 1,000 frames so caching stays useful on low-memory
    /// systems; no upper limit.
    pub fn auto_sized() -> Self {
        let mut sys = System::new_all();
        sys.refresh_memory();

        let available_bytes = sys.available_memory() as usize;
        let target_bytes = available_bytes / 4;
        let num_frames = (target_bytes / PAGE_SIZE).max(1_000);

        Self::new(BufferPoolConfig { num_frames })
    }

    /// Returns the number of frames in the pool.
    pub fn num_frames(&self) -> usize {
        self.config.num_frames
    }

    /// Returns the number of free frames.
    pub fn free_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Returns the number of pages currently in the pool.
    pub fn page_count(&self) -> usize {
        self.page_table.len()
    }

    /// Checks if a page is in the buffer pool.
    pub fn contains(&self, page_id: PageId) -> bool {
        self.page_table.contains(page_id)
    }

    /// Fetches a resident page from the buffer pool.
    ///
    /// Returns None if the page is not resident. The frame is returned
    /// unpinned; the access is recorded for the clock algorithm.
    #[inline]
    pub fn fetch_page(&self, page_id: PageId) -> Option<&BufferFrame> {
        let frame_id = self.page_table.get(page_id)?;
        let frame = &self.frames[frame_id.0 as usize];
        self.replacer.record_access(frame_id);
        Some(frame)
    }

    /// Allocates a frame for a new page.
    ///
    /// Tries the free list first, then evicts an unpinned frame.
    /// Returns the frame ID and any evicted dirty page that must be
    /// flushed by the caller.
    fn allocate_frame(&self) -> Result<(FrameId, Option<EvictedPage>)> {
        {
            let mut free_list = self.free_list.lock();
            if let Some(frame_id) = free_list.pop() {
                return Ok((frame_id, None));
            }
        }

        let victim_id = self
            .replacer
            .evict(|fid| self.frames[fid.0 as usize].pin_count() == 0);

        if let Some(victim_id) = victim_id {
            let frame = &self.frames[victim_id.0 as usize];

            // Capture evicted page data if dirty.
            let evicted = if frame.is_dirty() {
                frame.page_id().map(|page_id| {
                    let data_guard = frame.read_data();
                    let mut data = PageBuf::zeroed();
                    data.0.copy_from_slice(&data_guard.0);
                    drop(data_guard);
                    tracing::trace!(%page_id, frame = %victim_id, "evicting dirty page");
                    EvictedPage { page_id, data }
                })
            } else {
                None
            };

            // Remove the old page from the page table.
            if let Some(old_page_id) = frame.page_id() {
                self.page_table.remove(old_page_id);
            }

            return Ok((victim_id, evicted));
        }

        Err(MeridianError::PoolExhausted {
            capacity: self.config.num_frames,
        })
    }

    /// Installs a page in the buffer pool, allocating a frame for it.
    ///
    /// If the page is already resident, returns the existing frame.
    /// Returns (frame, evicted) where evicted carries any dirty page
    /// that was displaced; the caller must write it to disk.
    pub fn new_page(&self, page_id: PageId) -> Result<(&BufferFrame, Option<EvictedPage>)> {
        if let Some(frame_id) = self.page_table.get(page_id) {
            let frame = &self.frames[frame_id.0 as usize];
            self.replacer.record_access(frame_id);
            return Ok((frame, None));
        }

        let (frame_id, evicted) = self.allocate_frame()?;

        let frame = &self.frames[frame_id.0 as usize];
        frame.reset();
        frame.set_page_id(Some(page_id));
        self.replacer.record_access(frame_id);

        self.page_table.insert(page_id, frame_id);

        Ok((frame, evicted))
    }

    /// Loads page data into the buffer pool.
    ///
    /// Used when reading a page in from disk.
    pub fn load_page(
        &self,
        page_id: PageId,
        data: &[u8],
    ) -> Result<(&BufferFrame, Option<EvictedPage>)> {
        let (frame, evicted) = self.new_page(page_id)?;
        frame.copy_from(data);
        Ok((frame, evicted))
    }

    /// Flushes a single page through the provided callback if dirty.
    ///
    /// Returns true if the page was flushed.
    pub fn flush_page<F>(&self, page_id: PageId, mut flush_fn: F) -> Result<bool>
    where
        F: FnMut(PageId, &[u8; PAGE_SIZE]) -> Result<()>,
    {
        if let Some(frame_id) = self.page_table.get(page_id) {
            let frame = &self.frames[frame_id.0 as usize];

            if frame.is_dirty() {
                let data = frame.read_data();
                flush_fn(page_id, &data.0)?;
                frame.set_dirty(false);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Flushes all dirty pages through the provided callback.
    ///
    /// Returns the number of pages flushed.
    pub fn flush_all<F>(&self, mut flush_fn: F) -> Result<usize>
    where
        F: FnMut(PageId, &[u8; PAGE_SIZE]) -> Result<()>,
    {
        let mut flushed = 0;

        // Collect first to avoid holding data guards during flush.
        let mut resident = Vec::new();
        self.page_table.for_each(|page_id, frame_id| {
            resident.push((page_id, frame_id));
            true
        });

        for (page_id, frame_id) in resident {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_dirty() {
                let data = frame.read_data();
                flush_fn(page_id, &data.0)?;
                frame.set_dirty(false);
                flushed += 1;
            }
        }

        Ok(flushed)
    }

    /// Deletes a page from the buffer pool.
    ///
    /// Returns false if the page is pinned or not resident.
    pub fn delete_page(&self, page_id: PageId) -> bool {
        if let Some(frame_id) = self.page_table.remove(page_id) {
            let frame = &self.frames[frame_id.0 as usize];

            // Cannot delete a pinned page; re-insert.
            if frame.is_pinned() {
                self.page_table.insert(page_id, frame_id);
                return false;
            }

            self.replacer.remove(frame_id);
            frame.reset();
            self.free_list.lock().push(frame_id);

            return true;
        }
        false
    }

    /// Returns statistics about the buffer pool.
    pub fn stats(&self) -> BufferPoolStats {
        let mut pinned_count = 0;
        let mut dirty_count = 0;

        self.page_table.for_each(|_, frame_id| {
            let frame = &self.frames[frame_id.0 as usize];
            if frame.is_pinned() {
                pinned_count += 1;
            }
            if frame.is_dirty() {
                dirty_count += 1;
            }
            true
        });

        BufferPoolStats {
            total_frames: self.config.num_frames,
            free_frames: self.free_count(),
            used_frames: self.page_table.len(),
            pinned_frames: pinned_count,
            dirty_frames: dirty_count,
        }
    }
}

/// Statistics about the buffer pool.
#[derive(Debug, Clone)]
pub struct BufferPoolStats {
    /// Total number of frames.
    pub total_frames: usize,
    /// Number of free frames.
    pub free_frames: usize,
    /// Number of frames holding pages.
    pub used_frames: usize,
    /// Number of pinned frames.
    pub pinned_frames: usize,
    /// Number of dirty frames.
    pub dirty_frames: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_pool(num_frames: usize) -> BufferPool {
        BufferPool::new(BufferPoolConfig { num_frames })
    }

    #[test]
    fn test_buffer_pool_new() {
        let pool = create_test_pool(10);

        assert_eq!(pool.num_frames(), 10);
        assert_eq!(pool.free_count(), 10);
        assert_eq!(pool.page_count(), 0);
    }

    #[test]
    fn test_buffer_pool_new_page() {
        let pool = create_test_pool(10);

        let (frame, evicted) = pool.new_page(PageId(1)).unwrap();

        assert!(evicted.is_none());
        assert_eq!(frame.page_id(), Some(PageId(1)));
        assert_eq!(pool.free_count(), 9);
        assert_eq!(pool.page_count(), 1);
        assert!(pool.contains(PageId(1)));
    }

    #[test]
    fn test_buffer_pool_fetch_existing() {
        let pool = create_test_pool(10);

        pool.new_page(PageId(1)).unwrap();

        let frame = pool.fetch_page(PageId(1)).unwrap();
        assert_eq!(frame.page_id(), Some(PageId(1)));
    }

    #[test]
    fn test_buffer_pool_fetch_nonexistent() {
        let pool = create_test_pool(10);
        assert!(pool.fetch_page(PageId(1)).is_none());
    }

    #[test]
    fn test_buffer_pool_eviction() {
        let pool = create_test_pool(3);

        for i in 0..3 {
            pool.new_page(PageId(i)).unwrap();
        }

        assert_eq!(pool.free_count(), 0);
        assert_eq!(pool.page_count(), 3);

        // A fourth page forces an eviction of a clean page.
        let (_, evicted) = pool.new_page(PageId(99)).unwrap();

        assert!(evicted.is_none());
        assert_eq!(pool.page_count(), 3);
        assert!(pool.contains(PageId(99)));
    }

    #[test]
    fn test_buffer_pool_eviction_dirty() {
        let pool = create_test_pool(1);

        let (frame, _) = pool.new_page(PageId(1)).unwrap();
        frame.write_data()[0] = 0xAB;
        frame.set_dirty(true);

        let (_, evicted) = pool.new_page(PageId(2)).unwrap();

        let evicted = evicted.expect("dirty page should be returned on eviction");
        assert_eq!(evicted.page_id, PageId(1));
        assert_eq!(evicted.data[0], 0xAB);
    }

    #[test]
    fn test_buffer_pool_full_all_pinned() {
        let pool = create_test_pool(2);

        let (f1, _) = pool.new_page(PageId(1)).unwrap();
        f1.pin();
        let (f2, _) = pool.new_page(PageId(2)).unwrap();
        f2.pin();

        let result = pool.new_page(PageId(3));
        assert!(matches!(
            result,
            Err(MeridianError::PoolExhausted { capacity: 2 })
        ));

        f1.unpin();
        f2.unpin();
    }

    #[test]
    fn test_buffer_pool_never_evicts_pinned() {
        let pool = create_test_pool(2);

        let (f1, _) = pool.new_page(PageId(1)).unwrap();
        f1.pin();
        pool.new_page(PageId(2)).unwrap();

        // Page 2 is the only eviction candidate.
        pool.new_page(PageId(3)).unwrap();
        assert!(pool.contains(PageId(1)));
        assert!(!pool.contains(PageId(2)));

        f1.unpin();
    }

    #[test]
    fn test_buffer_pool_delete_page() {
        let pool = create_test_pool(10);

        pool.new_page(PageId(1)).unwrap();

        assert!(pool.contains(PageId(1)));
        assert!(pool.delete_page(PageId(1)));
        assert!(!pool.contains(PageId(1)));
        assert_eq!(pool.free_count(), 10);
    }

    #[test]
    fn test_buffer_pool_delete_pinned_page() {
        let pool = create_test_pool(10);

        let (frame, _) = pool.new_page(PageId(1)).unwrap();
        frame.pin();

        assert!(!pool.delete_page(PageId(1)));
        assert!(pool.contains(PageId(1)));

        frame.unpin();
    }

    #[test]
    fn test_buffer_pool_load_page() {
        let pool = create_test_pool(10);
        let data = [0xABu8; PAGE_SIZE];

        let (frame, _) = pool.load_page(PageId(1), &data).unwrap();

        let frame_data = frame.read_data();
        assert_eq!(frame_data[0], 0xAB);
        assert_eq!(frame_data[PAGE_SIZE - 1], 0xAB);
    }

    #[test]
    fn test_buffer_pool_flush_page() {
        let pool = create_test_pool(10);

        let (frame, _) = pool.new_page(PageId(1)).unwrap();
        frame.set_dirty(true);

        let mut flushed_pages = vec![];
        let result = pool.flush_page(PageId(1), |pid, _data| {
            flushed_pages.push(pid);
            Ok(())
        });

        assert!(result.unwrap());
        assert_eq!(flushed_pages, vec![PageId(1)]);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_buffer_pool_flush_page_clean_noop() {
        let pool = create_test_pool(10);
        pool.new_page(PageId(1)).unwrap();

        let result = pool.flush_page(PageId(1), |_, _| panic!("should not flush clean page"));
        assert!(!result.unwrap());
    }

    #[test]
    fn test_buffer_pool_flush_all() {
        let pool = create_test_pool(10);

        for i in 0..5 {
            let (frame, _) = pool.new_page(PageId(i)).unwrap();
            frame.set_dirty(true);
        }

        let mut flushed_count = 0;
        let result = pool.flush_all(|_pid, _data| {
            flushed_count += 1;
            Ok(())
        });

        assert_eq!(result.unwrap(), 5);
        assert_eq!(flushed_count, 5);
        assert_eq!(pool.stats().dirty_frames, 0);
    }

    #[test]
    fn test_buffer_pool_flush_all_propagates_error() {
        let pool = create_test_pool(10);

        let (frame, _) = pool.new_page(PageId(1)).unwrap();
        frame.set_dirty(true);

        let result = pool.flush_all(|_, _| {
            Err(MeridianError::Io(std::io::Error::other("disk gone")))
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_buffer_pool_stats() {
        let pool = create_test_pool(10);

        for i in 0..5 {
            let (frame, _) = pool.new_page(PageId(i)).unwrap();
            if i % 2 == 0 {
                frame.set_dirty(true);
            } else {
                frame.pin();
            }
        }

        let stats = pool.stats();
        assert_eq!(stats.total_frames, 10);
        assert_eq!(stats.free_frames, 5);
        assert_eq!(stats.used_frames, 5);
        assert_eq!(stats.pinned_frames, 2); // pages 1, 3
        assert_eq!(stats.dirty_frames, 3); // pages 0, 2, 4
    }

    #[test]
    fn test_buffer_pool_duplicate_new_page() {
        let pool = create_test_pool(10);

        pool.new_page(PageId(1)).unwrap();
        let (frame, evicted) = pool.new_page(PageId(1)).unwrap();

        assert!(evicted.is_none());
        assert_eq!(frame.page_id(), Some(PageId(1)));
        assert_eq!(pool.page_count(), 1);
    }
}
