//! Scoped pinned pointers into page-resident objects.

use meridian_buffer::BufferFrame;
use std::marker::PhantomData;

/// A typed pointer to an object inside a pinned page.
///
/// While a `PinnedPtr` lives it holds a +1 on its page's pin count, so
/// the page cannot be evicted and the embedded object address stays
/// valid. Cloning pins once more; dropping unpins; reassignment drops
/// the old pin and takes the new one. The pin is released on every
/// exit path, panics included.
///
/// Mutable access through [`std::ops::DerefMut`] marks the page dirty, so
/// anything written through a pinned pointer reaches the backing file
/// on eviction or write-back.
pub struct PinnedPtr<'p, T> {
    obj: *mut T,
    frame: Option<&'p BufferFrame>,
    _marker: PhantomData<&'p mut T>,
}

impl<'p, T> PinnedPtr<'p, T> {
    /// Creates a pinned pointer to `obj`, pinning `frame`.
    ///
    /// # Safety
    /// `obj` must point into the page held by `frame`, be properly
    /// aligned for `T`, and the allocation behind it must be at least
    /// `size_of::<T>()` bytes. Reads additionally require the bytes to
    /// be a valid `T`; fresh allocations must go through
    /// [`PinnedPtr::write`] before the first read.
    pub(crate) unsafe fn new(obj: *mut T, frame: &'p BufferFrame) -> Self {
        frame.pin();
        Self {
            obj,
            frame: Some(frame),
            _marker: PhantomData,
        }
    }

    /// The null pinned pointer: addresses nothing, pins nothing.
    pub fn null() -> Self {
        Self {
            obj: std::ptr::null_mut(),
            frame: None,
            _marker: PhantomData,
        }
    }

    /// Returns true if this pointer addresses nothing.
    pub fn is_null(&self) -> bool {
        self.obj.is_null()
    }

    /// Overwrites the object in place without reading the old bytes.
    ///
    /// This is the initialization path for freshly allocated objects,
    /// whose bytes may be anything the page held before.
    pub fn write(&mut self, value: T) {
        assert!(!self.is_null(), "write through null pinned pointer");
        unsafe { self.obj.write(value) };
        if let Some(frame) = self.frame {
            frame.set_dirty(true);
        }
    }

    /// Reinterprets the object as a different type, sharing the page
    /// pin. The caller is responsible for the bytes being validly
    /// interpretable as `U`.
    pub fn cast<U>(&self) -> PinnedPtr<'p, U> {
        match self.frame {
            Some(frame) => unsafe { PinnedPtr::new(self.obj as *mut U, frame) },
            None => PinnedPtr::null(),
        }
    }

    /// The frame this pointer pins, if any.
    pub fn frame(&self) -> Option<&'p BufferFrame> {
        self.frame
    }
}

impl<T> Clone for PinnedPtr<'_, T> {
    fn clone(&self) -> Self {
        if let Some(frame) = self.frame {
            frame.pin();
        }
        Self {
            obj: self.obj,
            frame: self.frame,
            _marker: PhantomData,
        }
    }
}

impl<T> Drop for PinnedPtr<'_, T> {
    fn drop(&mut self) {
        if let Some(frame) = self.frame {
            frame.unpin();
        }
    }
}

impl<T> std::ops::Deref for PinnedPtr<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        assert!(!self.is_null(), "deref of null pinned pointer");
        unsafe { &*self.obj }
    }
}

impl<T> std::ops::DerefMut for PinnedPtr<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        assert!(!self.is_null(), "deref of null pinned pointer");
        if let Some(frame) = self.frame {
            frame.set_dirty(true);
        }
        unsafe { &mut *self.obj }
    }
}

/// Equality compares the embedded object addresses.
impl<T> PartialEq for PinnedPtr<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.obj, other.obj)
    }
}

impl<T> Eq for PinnedPtr<'_, T> {}

impl<T> std::fmt::Debug for PinnedPtr<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinnedPtr").field("obj", &self.obj).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_buffer::FrameId;
    use meridian_common::page::PAGE_HEADER_SIZE;

    fn test_frame() -> BufferFrame {
        BufferFrame::new(FrameId(0))
    }

    fn ptr_to<T>(frame: &BufferFrame, offset: usize) -> PinnedPtr<'_, T> {
        let obj = unsafe { frame.data_ptr_mut().add(PAGE_HEADER_SIZE + offset) as *mut T };
        unsafe { PinnedPtr::new(obj, frame) }
    }

    #[test]
    fn test_pin_on_create_unpin_on_drop() {
        let frame = test_frame();

        {
            let _p: PinnedPtr<'_, u64> = ptr_to(&frame, 0);
            assert_eq!(frame.pin_count(), 1);

            let _q: PinnedPtr<'_, u64> = ptr_to(&frame, 8);
            assert_eq!(frame.pin_count(), 2);
        }

        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_clone_pins_again() {
        let frame = test_frame();

        let p: PinnedPtr<'_, u64> = ptr_to(&frame, 0);
        let q = p.clone();
        assert_eq!(frame.pin_count(), 2);
        assert_eq!(p, q);

        drop(p);
        assert_eq!(frame.pin_count(), 1);
        drop(q);
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_reassignment_transfers_pin() {
        let frame_a = BufferFrame::new(FrameId(0));
        let frame_b = BufferFrame::new(FrameId(1));

        let mut p: PinnedPtr<'_, u64> = ptr_to(&frame_a, 0);
        let q: PinnedPtr<'_, u64> = ptr_to(&frame_b, 0);
        assert_eq!(frame_a.pin_count(), 1);
        assert_eq!(frame_b.pin_count(), 1);

        p = q.clone();
        assert_eq!(frame_a.pin_count(), 0);
        assert_eq!(frame_b.pin_count(), 2);

        drop(p);
        drop(q);
        assert_eq!(frame_b.pin_count(), 0);
    }

    #[test]
    fn test_write_and_read_back() {
        let frame = test_frame();

        let mut p: PinnedPtr<'_, u64> = ptr_to(&frame, 16);
        p.write(0xDEAD_BEEF);
        assert_eq!(*p, 0xDEAD_BEEF);
        assert!(frame.is_dirty());
    }

    #[test]
    fn test_deref_mut_marks_dirty() {
        let frame = test_frame();

        let mut p: PinnedPtr<'_, u64> = ptr_to(&frame, 0);
        p.write(1);
        frame.set_dirty(false);

        *p = 2;
        assert!(frame.is_dirty());
        assert_eq!(*p, 2);
    }

    #[test]
    fn test_null_pointer() {
        let p: PinnedPtr<'_, u64> = PinnedPtr::null();
        assert!(p.is_null());
        assert!(p.frame().is_none());
        assert_eq!(p, PinnedPtr::null());

        let q = p.clone();
        assert!(q.is_null());
    }

    #[test]
    #[should_panic(expected = "deref of null pinned pointer")]
    fn test_null_deref_panics() {
        let p: PinnedPtr<'_, u64> = PinnedPtr::null();
        let _ = *p;
    }

    #[test]
    fn test_cast_shares_pin() {
        let frame = test_frame();

        let mut p: PinnedPtr<'_, u64> = ptr_to(&frame, 0);
        p.write(u64::from_le_bytes([1, 2, 3, 4, 5, 6, 7, 8]));

        {
            let bytes: PinnedPtr<'_, [u8; 8]> = p.cast();
            assert_eq!(frame.pin_count(), 2);
            assert_eq!(*bytes, [1, 2, 3, 4, 5, 6, 7, 8]);
        }

        assert_eq!(frame.pin_count(), 1);
    }

    #[test]
    fn test_pin_survives_panic() {
        let frame = test_frame();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _p: PinnedPtr<'_, u64> = ptr_to(&frame, 0);
            panic!("boom");
        }));
        assert!(result.is_err());

        // The unwind ran the destructor.
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_equality_on_object_address() {
        let frame = test_frame();

        let p: PinnedPtr<'_, u64> = ptr_to(&frame, 0);
        let q: PinnedPtr<'_, u64> = ptr_to(&frame, 0);
        let r: PinnedPtr<'_, u64> = ptr_to(&frame, 8);

        assert_eq!(p, q);
        assert_ne!(p, r);
    }
}
