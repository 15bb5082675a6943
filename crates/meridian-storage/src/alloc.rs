//! Tree-node allocator: variable-size objects inside cached pages.
//!
//! Objects are placed by a bump pointer at the tail of the current
//! page; freed regions go to a coalescing free list that is searched
//! first-fit before the bump head is touched. Every allocation yields
//! a stable [`NodeHandle`] plus a [`PinnedPtr`] to the fresh bytes.

use crate::cache::PageCache;
use crate::free_list::FreeList;
use crate::handle::{HandleType, NodeHandle};
use crate::pinned::PinnedPtr;
use meridian_buffer::BufferFrame;
use meridian_common::page::{PageId, PAGE_DATA_SIZE, PAGE_HEADER_SIZE};
use meridian_common::polygon::{unbounded_polygon_size, MAX_RECTANGLE_COUNT};
use meridian_common::{IndexConfig, Result};
use parking_lot::Mutex;

/// Minimum useful fragment size, in bytes.
///
/// A free-list remainder at or below this is dropped rather than
/// tracked: it is the size of the largest variable-layout object (an
/// unbounded polygon one past the inline capacity), so every retained
/// fragment can hold any object the tree allocates. A smaller bound
/// would lose less space but grow the list every first-fit scan walks.
pub const TAIL_MIN: usize = unbounded_polygon_size(MAX_RECTANGLE_COUNT + 1);

struct AllocState {
    /// Page the bump pointer currently sits in.
    cur_page: u32,
    /// Bytes remaining at the tail of that page.
    space_left: u16,
    /// Freed regions, sorted and coalesced.
    free_list: FreeList,
}

/// Slab allocator over the page cache, yielding persistent
/// `(page_id, offset)` handles.
///
/// Bump state and the free list are not persisted: on reopen the bump
/// head resumes past the pre-existing pages and the free list starts
/// empty, so handles from earlier sessions stay valid.
pub struct NodeAllocator {
    cache: PageCache,
    state: Mutex<AllocState>,
    #[cfg(debug_assertions)]
    tag_sizes: Mutex<std::collections::HashMap<u16, u16>>,
}

impl NodeAllocator {
    /// Opens the allocator over the configured backing file.
    pub fn open(config: &IndexConfig) -> Result<Self> {
        let cache = PageCache::open(config)?;
        let cur_page = cache.preexisting_page_count();

        Ok(Self {
            cache,
            state: Mutex::new(AllocState {
                cur_page,
                space_left: PAGE_DATA_SIZE as u16,
                free_list: FreeList::new(),
            }),
            #[cfg(debug_assertions)]
            tag_sizes: Mutex::new(std::collections::HashMap::new()),
        })
    }

    /// The page cache backing this allocator.
    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Records the expected allocation size for a type tag. Frees of
    /// handles carrying the tag are checked against it in debug
    /// builds.
    pub fn register_type_size(&self, tag: HandleType, size: u16) {
        #[cfg(debug_assertions)]
        self.tag_sizes.lock().insert(tag.0, size);
        #[cfg(not(debug_assertions))]
        let _ = (tag, size);
    }

    /// Allocates an object of type `T`.
    pub fn allocate<T>(&self, tag: HandleType) -> Result<(PinnedPtr<'_, T>, NodeHandle)> {
        self.allocate_sized(std::mem::size_of::<T>() as u16, tag)
    }

    /// Allocates `size` bytes viewed as a `T`. Used for variable-size
    /// layouts whose real size exceeds `size_of::<T>()`.
    ///
    /// The returned bytes are uninitialized; write the object through
    /// [`PinnedPtr::write`] (or field stores for tail arrays) before
    /// reading.
    pub fn allocate_sized<T>(
        &self,
        size: u16,
        tag: HandleType,
    ) -> Result<(PinnedPtr<'_, T>, NodeHandle)> {
        assert!(
            size as usize <= PAGE_DATA_SIZE,
            "allocation of {} bytes exceeds page data size",
            size
        );
        debug_assert!(std::mem::size_of::<T>() <= size as usize);

        let mut state = self.state.lock();

        if let Some(entry) = state.free_list.take_first_fit(size) {
            let mut handle = entry.handle;
            handle.set_type(tag);

            let remainder = entry.size - size;
            if remainder as usize > TAIL_MIN {
                state
                    .free_list
                    .insert(handle.at_offset(handle.offset() + size), remainder);
            }
            // Remainders at or below TAIL_MIN are dropped: accepted
            // fragmentation.

            drop(state);
            let frame = self.cache.get_page(handle.page_id())?;
            return Ok((self.pinned_at(frame, handle.offset()), handle));
        }

        let frame = Self::page_to_alloc_on(&self.cache, &mut state, size)?;
        let offset = (PAGE_DATA_SIZE - state.space_left as usize) as u16;
        state.space_left -= size;
        let handle = NodeHandle::new(PageId(state.cur_page), offset, tag);
        drop(state);

        Ok((self.pinned_at(frame, offset), handle))
    }

    /// Returns the object addressed by `handle` as a pinned pointer.
    pub fn resolve<T>(&self, handle: NodeHandle) -> Result<PinnedPtr<'_, T>> {
        debug_assert!(!handle.is_null(), "resolve of null handle");
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.state.lock().free_list.covers(handle),
                "resolve of freed handle {}",
                handle
            );
        }

        let frame = self.cache.get_page(handle.page_id())?;
        Ok(self.pinned_at(frame, handle.offset()))
    }

    /// Returns `alloc_size` bytes at `handle` to the free list.
    ///
    /// Freeing the null handle is a no-op. Freeing with a size that
    /// does not match the handle's registered type tag, or freeing the
    /// same region twice, is a bug caught in debug builds.
    pub fn free(&self, handle: NodeHandle, alloc_size: u16) {
        if handle.is_null() {
            return;
        }
        #[cfg(debug_assertions)]
        {
            if let Some(&expected) = self.tag_sizes.lock().get(&handle.type_tag().0) {
                assert_eq!(
                    alloc_size, expected,
                    "free of {} with size {} but its type tag records {}",
                    handle, alloc_size, expected
                );
            }
        }

        let mut state = self.state.lock();
        debug_assert!(
            !state.free_list.covers(handle),
            "double free of {}",
            handle
        );
        state.free_list.insert(handle, alloc_size);
    }

    /// Number of entries in the free list.
    pub fn free_list_len(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Page the bump pointer currently sits in.
    pub fn current_page(&self) -> u32 {
        self.state.lock().cur_page
    }

    /// Bytes remaining at the tail of the current page.
    pub fn space_left_in_current_page(&self) -> u16 {
        self.state.lock().space_left
    }

    fn pinned_at<'a, T>(&'a self, frame: &'a BufferFrame, offset: u16) -> PinnedPtr<'a, T> {
        // Offsets are relative to the data region past the header.
        let obj = unsafe {
            frame
                .data_ptr_mut()
                .add(PAGE_HEADER_SIZE + offset as usize) as *mut T
        };
        debug_assert!(obj as usize % std::mem::align_of::<T>() == 0);
        unsafe { PinnedPtr::new(obj, frame) }
    }

    /// Returns the frame to bump-allocate `size` bytes into, advancing
    /// to a fresh page (and donating the old tail to the free list if
    /// it is large enough to be useful) when the current page is out
    /// of room.
    fn page_to_alloc_on<'c>(
        cache: &'c PageCache,
        state: &mut AllocState,
        size: u16,
    ) -> Result<&'c BufferFrame> {
        if state.space_left < size {
            let tail = state.space_left;
            if tail as usize > TAIL_MIN {
                let offset = (PAGE_DATA_SIZE - tail as usize) as u16;
                tracing::trace!(page = state.cur_page, offset, tail, "donating page tail");
                state.free_list.insert(
                    NodeHandle::new(PageId(state.cur_page), offset, HandleType::UNTYPED),
                    tail,
                );
            }
            state.cur_page += 1;
            state.space_left = PAGE_DATA_SIZE as u16;
        }
        cache.get_page(PageId(state.cur_page))
    }
}
