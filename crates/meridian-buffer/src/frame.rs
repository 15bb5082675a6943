//! Buffer frame management.

use meridian_common::page::{PageBuf, PageId, PAGE_SIZE};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Sentinel value indicating no page is loaded in the frame.
const NO_PAGE: u32 = u32::MAX;

/// Unique identifier for a frame in the buffer pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u32);

impl FrameId {
    /// Invalid frame ID.
    pub const INVALID: FrameId = FrameId(u32::MAX);

    /// Returns true if this is a valid frame ID.
    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }
}

impl std::fmt::Display for FrameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frame:{}", self.0)
    }
}

/// A frame in the buffer pool holding a single page.
///
/// Each frame contains the page bytes (`PAGE_SIZE`) plus the runtime
/// metadata the on-disk header cannot carry: the live pin count, the
/// dirty flag, and the clock reference bit. A frame with a non-zero
/// pin count must never be evicted; the pool's victim selection
/// checks the pin count at sweep time.
pub struct BufferFrame {
    /// Frame identifier.
    frame_id: FrameId,
    /// The page currently stored in this frame (NO_PAGE = none).
    page_id: AtomicU32,
    /// Page data buffer.
    data: RwLock<Box<PageBuf>>,
    /// Number of live pinned pointers into this page.
    pin_count: AtomicU32,
    /// Whether the page has been modified since it was loaded.
    is_dirty: AtomicBool,
    /// Reference bit for clock replacement.
    reference_bit: AtomicBool,
}

impl BufferFrame {
    /// Creates a new empty buffer frame.
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicU32::new(NO_PAGE),
            data: RwLock::new(PageBuf::zeroed()),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            reference_bit: AtomicBool::new(false),
        }
    }

    /// Returns the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Returns the page ID currently stored in this frame.
    #[inline]
    pub fn page_id(&self) -> Option<PageId> {
        let raw = self.page_id.load(Ordering::Acquire);
        if raw == NO_PAGE {
            None
        } else {
            Some(PageId(raw))
        }
    }

    /// Sets the page ID for this frame.
    #[inline]
    pub fn set_page_id(&self, page_id: Option<PageId>) {
        let raw = match page_id {
            Some(pid) => pid.0,
            None => NO_PAGE,
        };
        self.page_id.store(raw, Ordering::Release);
    }

    /// Returns the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Increments the pin count and returns the previous value.
    #[inline]
    pub fn pin(&self) -> u32 {
        let prev = self.pin_count.fetch_add(1, Ordering::AcqRel);
        self.reference_bit.store(true, Ordering::Relaxed);
        prev
    }

    /// Decrements the pin count and returns the new value.
    ///
    /// Unpinning an unpinned frame is a bug in the caller.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let prev = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(prev > 0, "unpin of frame with pin count zero");
        if prev == 0 {
            // Release-build underflow protection: restore to 0.
            self.pin_count.store(0, Ordering::Release);
            return 0;
        }
        prev - 1
    }

    /// Returns true if this frame is pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count.load(Ordering::Acquire) > 0
    }

    /// Returns true if this frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Marks this frame as dirty or clean.
    #[inline]
    pub fn set_dirty(&self, dirty: bool) {
        self.is_dirty.store(dirty, Ordering::Release);
    }

    /// Returns the reference bit value.
    #[inline]
    pub fn reference_bit(&self) -> bool {
        self.reference_bit.load(Ordering::Relaxed)
    }

    /// Sets the reference bit.
    #[inline]
    pub fn set_reference_bit(&self, value: bool) {
        self.reference_bit.store(value, Ordering::Relaxed);
    }

    /// Returns true if this frame is empty (no page loaded).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.page_id.load(Ordering::Acquire) == NO_PAGE
    }

    /// Reads the page data.
    #[inline]
    pub fn read_data(&self) -> parking_lot::RwLockReadGuard<'_, Box<PageBuf>> {
        self.data.read()
    }

    /// Writes to the page data.
    #[inline]
    pub fn write_data(&self) -> parking_lot::RwLockWriteGuard<'_, Box<PageBuf>> {
        self.data.write()
    }

    /// Copies data into the frame.
    #[inline]
    pub fn copy_from(&self, src: &[u8]) {
        let mut data = self.data.write();
        let len = src.len().min(PAGE_SIZE);
        data[..len].copy_from_slice(&src[..len]);
    }

    /// Copies data out of the frame.
    #[inline]
    pub fn copy_to(&self, dst: &mut [u8]) {
        let data = self.data.read();
        let len = dst.len().min(PAGE_SIZE);
        dst[..len].copy_from_slice(&data[..len]);
    }

    /// Returns a raw pointer to the frame's page bytes.
    ///
    /// # Safety
    /// Caller must ensure:
    /// - The frame stays pinned for as long as the pointer is used
    /// - The bytes reached through the pointer are not aliased by a
    ///   conflicting mutable access
    #[inline]
    pub unsafe fn data_ptr(&self) -> *const u8 {
        // The Box itself is never replaced, so its heap pointer is
        // stable for the life of the frame.
        unsafe { (*self.data.data_ptr()).0.as_ptr() }
    }

    /// Returns a mutable raw pointer to the frame's page bytes.
    ///
    /// # Safety
    /// Same contract as [`BufferFrame::data_ptr`], plus the caller must
    /// guarantee exclusive access to the byte ranges it writes.
    #[inline]
    pub unsafe fn data_ptr_mut(&self) -> *mut u8 {
        unsafe { (*self.data.data_ptr()).0.as_mut_ptr() }
    }

    /// Resets the frame to empty state.
    #[inline]
    pub fn reset(&self) {
        self.page_id.store(NO_PAGE, Ordering::Release);
        self.pin_count.store(0, Ordering::Release);
        self.is_dirty.store(false, Ordering::Release);
        self.reference_bit.store(false, Ordering::Relaxed);
        let mut data = self.data.write();
        data.fill(0);
    }
}

impl std::fmt::Debug for BufferFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferFrame")
            .field("frame_id", &self.frame_id)
            .field("page_id", &self.page_id())
            .field("pin_count", &self.pin_count())
            .field("is_dirty", &self.is_dirty())
            .field("reference_bit", &self.reference_bit())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_id_validity() {
        assert!(FrameId(0).is_valid());
        assert!(!FrameId::INVALID.is_valid());
    }

    #[test]
    fn test_frame_id_display() {
        assert_eq!(FrameId(42).to_string(), "frame:42");
    }

    #[test]
    fn test_buffer_frame_new() {
        let frame = BufferFrame::new(FrameId(0));

        assert_eq!(frame.frame_id(), FrameId(0));
        assert!(frame.page_id().is_none());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert!(!frame.reference_bit());
        assert!(frame.is_empty());
    }

    #[test]
    fn test_buffer_frame_pin_unpin() {
        let frame = BufferFrame::new(FrameId(0));

        assert!(!frame.is_pinned());

        frame.pin();
        assert!(frame.is_pinned());
        assert_eq!(frame.pin_count(), 1);
        assert!(frame.reference_bit());

        frame.pin();
        assert_eq!(frame.pin_count(), 2);

        frame.unpin();
        assert_eq!(frame.pin_count(), 1);

        frame.unpin();
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_pinned());
    }

    #[test]
    fn test_buffer_frame_dirty() {
        let frame = BufferFrame::new(FrameId(0));

        assert!(!frame.is_dirty());
        frame.set_dirty(true);
        assert!(frame.is_dirty());
        frame.set_dirty(false);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_buffer_frame_page_id() {
        let frame = BufferFrame::new(FrameId(0));

        assert!(frame.page_id().is_none());

        frame.set_page_id(Some(PageId(100)));
        assert_eq!(frame.page_id(), Some(PageId(100)));
        assert!(!frame.is_empty());

        frame.set_page_id(None);
        assert!(frame.page_id().is_none());
        assert!(frame.is_empty());
    }

    #[test]
    fn test_buffer_frame_data_access() {
        let frame = BufferFrame::new(FrameId(0));

        {
            let mut data = frame.write_data();
            data[0] = 0xAB;
            data[PAGE_SIZE - 1] = 0xCD;
        }

        {
            let data = frame.read_data();
            assert_eq!(data[0], 0xAB);
            assert_eq!(data[PAGE_SIZE - 1], 0xCD);
        }
    }

    #[test]
    fn test_buffer_frame_copy_from_to() {
        let frame = BufferFrame::new(FrameId(0));
        let src = [1u8, 2, 3, 4, 5];

        frame.copy_from(&src);

        let mut dst = [0u8; 5];
        frame.copy_to(&mut dst);

        assert_eq!(dst, src);
    }

    #[test]
    fn test_buffer_frame_data_ptr_matches_lock_view() {
        let frame = BufferFrame::new(FrameId(0));
        frame.copy_from(&[0x5A, 0x5B]);

        frame.pin();
        let ptr = unsafe { frame.data_ptr() };
        assert_eq!(unsafe { *ptr }, 0x5A);
        assert_eq!(unsafe { *ptr.add(1) }, 0x5B);
        frame.unpin();
    }

    #[test]
    fn test_buffer_frame_reset() {
        let frame = BufferFrame::new(FrameId(0));

        frame.set_page_id(Some(PageId(1)));
        frame.pin();
        frame.set_dirty(true);
        frame.set_reference_bit(true);
        frame.copy_from(&[0xFF]);

        frame.reset();

        assert!(frame.page_id().is_none());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert!(!frame.reference_bit());
        assert_eq!(frame.read_data()[0], 0);
    }

    #[test]
    fn test_buffer_frame_pin_sets_reference() {
        let frame = BufferFrame::new(FrameId(0));

        assert!(!frame.reference_bit());
        frame.pin();
        assert!(frame.reference_bit());
        frame.unpin();
    }

    #[test]
    fn test_buffer_frame_debug() {
        let frame = BufferFrame::new(FrameId(5));
        frame.set_page_id(Some(PageId(10)));

        let debug_str = format!("{:?}", frame);
        assert!(debug_str.contains("BufferFrame"));
        assert!(debug_str.contains("pin_count"));
    }
}
